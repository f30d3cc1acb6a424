//! OAuth connection and token upkeep.
//!
//! ## What this does
//! - Completes the authorization-code callbacks: exchange the code, confirm
//!   the token with a health check, store the credentials and approve the
//!   retailer.
//! - Refreshes tokens older than `tokens.refresh_after_days`; retailers whose
//!   token already expired (or was rejected) are disconnected.
//!
//! ## Transactions & consistency
//! Two refreshes of one retailer may race. The write is conditional on the
//! token the refresher read (`token_created_at`), so only one of them lands;
//! the loser reports [`RefreshResult::LostRace`].

use chrono::{DateTime, Duration, Utc};
use diesel::SqliteConnection;
use pos_client::{ProviderError, models::Origin};

use crate::{
    context::SyncContext,
    error::{SyncError, SyncResult},
    models::Retailer,
    repo::retailers,
};

/// Start an authorization: store and return a fresh CSRF `state` for the callback.
pub fn begin_authorization(conn: &mut SqliteConnection, retailer_id: i32) -> SyncResult<String> {
    let state = uuid::Uuid::new_v4().simple().to_string();
    retailers::set_oauth_state(conn, retailer_id, Some(&state))?;
    Ok(state)
}

/// `GET /oauth/square/callback?code&state`.
pub async fn complete_square_callback(
    ctx: &SyncContext,
    conn: &mut SqliteConnection,
    code: &str,
    state: &str,
) -> SyncResult<Retailer> {
    let retailer = retailers::find_by_oauth_state(conn, state)?
        .filter(|r| r.origin().ok() == Some(Origin::Square))
        .ok_or_else(|| SyncError::Validation("unknown oauth state".into()))?;
    let oauth = ctx.factory.oauth(&retailer)?;
    let grant = oauth.exchange_code(code, None).await?;
    let merchant_id = grant
        .merchant_id
        .clone()
        .ok_or_else(|| SyncError::Validation("token grant carries no merchant id".into()))?;
    connect(ctx, conn, &retailer, &grant, &merchant_id).await
}

/// `GET /oauth/clover/callback/{retailer_id}?code&merchant_id`.
pub async fn complete_clover_callback(
    ctx: &SyncContext,
    conn: &mut SqliteConnection,
    retailer_id: i32,
    code: &str,
    merchant_id: &str,
) -> SyncResult<Retailer> {
    let retailer = retailers::get_retailer(conn, retailer_id)?;
    if retailer.origin()? != Origin::Clover {
        return Err(SyncError::Validation(format!(
            "retailer {retailer_id} is not a Clover merchant"
        )));
    }
    let oauth = ctx.factory.oauth(&retailer)?;
    let grant = oauth.exchange_code(code, Some(merchant_id)).await?;
    connect(ctx, conn, &retailer, &grant, merchant_id).await
}

async fn connect(
    ctx: &SyncContext,
    conn: &mut SqliteConnection,
    retailer: &Retailer,
    grant: &pos_client::models::TokenGrant,
    merchant_id: &str,
) -> SyncResult<Retailer> {
    let oauth = ctx.factory.oauth(retailer)?;
    if !oauth
        .health_check(&grant.access_token, Some(merchant_id))
        .await?
    {
        return Err(SyncError::Validation(
            "provider rejected the new access token".into(),
        ));
    }
    ctx.credentials
        .set(conn, retailer.id, grant, Utc::now(), None)?;
    let approved = retailers::approve(conn, retailer.id, merchant_id)?;
    tracing::info!(retailer_id = approved.id, merchant_id, origin = %approved.origin, "retailer connected");
    Ok(approved)
}

/// Drop a retailer's tokens.
pub fn disconnect(ctx: &SyncContext, conn: &mut SqliteConnection, retailer_id: i32) -> SyncResult<()> {
    ctx.credentials.clear(conn, retailer_id)?;
    tracing::info!(retailer_id, "retailer disconnected");
    Ok(())
}

/// What happened to one retailer's token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshResult {
    Refreshed,
    /// Another refresher replaced the token first; nothing was written.
    LostRace,
    /// The token was expired or rejected and has been removed.
    Disconnected,
    NotConnected,
    /// The provider issues no refresh tokens for this retailer.
    NotRefreshable,
}

/// Refresh one retailer's token as of `now`.
pub async fn refresh_retailer(
    ctx: &SyncContext,
    conn: &mut SqliteConnection,
    retailer_id: i32,
    now: DateTime<Utc>,
) -> SyncResult<RefreshResult> {
    let Some(credentials) = ctx.credentials.get(conn, retailer_id)? else {
        return Ok(RefreshResult::NotConnected);
    };
    if credentials.is_expired(now) {
        disconnect(ctx, conn, retailer_id)?;
        return Ok(RefreshResult::Disconnected);
    }
    let Some(refresh_token) = credentials.refresh_token.as_ref() else {
        return Ok(RefreshResult::NotRefreshable);
    };

    let retailer = retailers::get_retailer(conn, retailer_id)?;
    let oauth = ctx.factory.oauth(&retailer)?;
    let grant = match oauth.refresh(refresh_token).await {
        Ok(grant) => grant,
        Err(ProviderError::AuthExpired(reason)) => {
            tracing::warn!(retailer_id, reason, "refresh token rejected");
            disconnect(ctx, conn, retailer_id)?;
            return Ok(RefreshResult::Disconnected);
        }
        Err(e) => return Err(e.into()),
    };

    let stored = ctx.credentials.set(
        conn,
        retailer_id,
        &grant,
        now,
        Some(&credentials.created_at),
    )?;
    if !stored {
        tracing::info!(retailer_id, "token refreshed concurrently, keeping the other write");
        return Ok(RefreshResult::LostRace);
    }
    tracing::info!(retailer_id, expires_at = %grant.expires_at, "token refreshed");
    Ok(RefreshResult::Refreshed)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub refreshed: usize,
    pub disconnected: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Refresh every token issued at least `refresh_after_days` before `now`.
pub async fn refresh_tokens(
    ctx: &SyncContext,
    conn: &mut SqliteConnection,
    now: DateTime<Utc>,
) -> SyncResult<RefreshReport> {
    let cutoff = now - Duration::days(ctx.config.tokens.refresh_after_days);
    let mut report = RefreshReport::default();
    for retailer in retailers::tokens_issued_before(conn, cutoff)? {
        match refresh_retailer(ctx, conn, retailer.id, now).await {
            Ok(RefreshResult::Refreshed) => report.refreshed += 1,
            Ok(RefreshResult::Disconnected) => report.disconnected += 1,
            Ok(_) => report.skipped += 1,
            Err(e) => {
                report.failed += 1;
                tracing::warn!(retailer_id = retailer.id, error = %e, "token refresh failed");
            }
        }
    }
    tracing::info!(
        refreshed = report.refreshed,
        disconnected = report.disconnected,
        skipped = report.skipped,
        failed = report.failed,
        "token refresh sweep finished"
    );
    Ok(report)
}
