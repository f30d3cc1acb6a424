//! Merchant accounts and their provider credentials.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use pos_client::models::{Origin, TokenGrant};
use secrecy::{ExposeSecret, SecretString};

use crate::{
    error::{SyncError, SyncResult},
    models::Retailer,
    schema::retailers,
    tz,
};

pub const STATUS_REQUESTING: &str = "requesting";
pub const STATUS_APPROVED: &str = "approved";
pub const STATUS_DENIED: &str = "denied";

impl Retailer {
    pub fn origin(&self) -> SyncResult<Origin> {
        self.origin
            .parse()
            .map_err(SyncError::Validation)
    }

    pub fn is_approved(&self) -> bool {
        self.status == STATUS_APPROVED
    }

    /// The merchant id, required by every provider call.
    pub fn merchant(&self) -> SyncResult<&str> {
        self.merchant_id
            .as_deref()
            .ok_or_else(|| SyncError::Validation(format!("retailer {} has no merchant id", self.id)))
    }
}

/// A retailer registration before the merchant has authorized the app.
#[derive(Debug, Clone)]
pub struct NewRetailer<'a> {
    pub name: &'a str,
    pub origin: Origin,
    pub app_id: &'a str,
    pub app_secret: &'a str,
    pub merchant_id: Option<&'a str>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = retailers)]
struct RetailerRow<'a> {
    name: &'a str,
    origin: &'a str,
    app_id: &'a str,
    app_secret: &'a str,
    merchant_id: Option<&'a str>,
}

pub fn create_retailer(conn: &mut SqliteConnection, new: &NewRetailer<'_>) -> SyncResult<Retailer> {
    let saved = diesel::insert_into(retailers::table)
        .values(&RetailerRow {
            name: new.name,
            origin: new.origin.as_str(),
            app_id: new.app_id,
            app_secret: new.app_secret,
            merchant_id: new.merchant_id,
        })
        .returning(Retailer::as_returning())
        .get_result(conn)?;
    Ok(saved)
}

pub fn get_retailer(conn: &mut SqliteConnection, retailer_id: i32) -> SyncResult<Retailer> {
    retailers::table
        .find(retailer_id)
        .select(Retailer::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| SyncError::not_found("retailer", retailer_id))
}

/// Approved retailer behind a merchant, restricted to `app_id` when given.
pub fn find_approved_by_merchant(
    conn: &mut SqliteConnection,
    origin: Origin,
    merchant_id: &str,
    app_id: Option<&str>,
) -> SyncResult<Option<Retailer>> {
    let mut query = retailers::table
        .filter(retailers::origin.eq(origin.as_str()))
        .filter(retailers::merchant_id.eq(merchant_id))
        .filter(retailers::status.eq(STATUS_APPROVED))
        .order(retailers::id)
        .select(Retailer::as_select())
        .into_boxed();
    if let Some(app_id) = app_id {
        query = query.filter(retailers::app_id.eq(app_id));
    }
    Ok(query.first(conn).optional()?)
}

pub fn find_by_oauth_state(
    conn: &mut SqliteConnection,
    state: &str,
) -> SyncResult<Option<Retailer>> {
    let row = retailers::table
        .filter(retailers::oauth_state.eq(state))
        .select(Retailer::as_select())
        .first(conn)
        .optional()?;
    Ok(row)
}

/// Approved retailers holding a token, optionally of one provider.
pub fn syncable_retailers(
    conn: &mut SqliteConnection,
    origin: Option<Origin>,
) -> SyncResult<Vec<Retailer>> {
    let mut query = retailers::table
        .filter(retailers::status.eq(STATUS_APPROVED))
        .filter(retailers::access_token.is_not_null())
        .select(Retailer::as_select())
        .order(retailers::id)
        .into_boxed();
    if let Some(origin) = origin {
        query = query.filter(retailers::origin.eq(origin.as_str()));
    }
    Ok(query.load(conn)?)
}

/// Retailers whose token was issued at or before `cutoff`.
pub fn tokens_issued_before(
    conn: &mut SqliteConnection,
    cutoff: DateTime<Utc>,
) -> SyncResult<Vec<Retailer>> {
    let rows = retailers::table
        .filter(retailers::token_created_at.le(tz::to_rfc3339_millis(cutoff)))
        .order(retailers::id)
        .select(Retailer::as_select())
        .load(conn)?;
    Ok(rows)
}

pub fn set_oauth_state(
    conn: &mut SqliteConnection,
    retailer_id: i32,
    state: Option<&str>,
) -> SyncResult<()> {
    diesel::update(retailers::table.find(retailer_id))
        .set(retailers::oauth_state.eq(state))
        .execute(conn)?;
    Ok(())
}

/// Mark the retailer approved for `merchant_id` and consume the OAuth state.
pub fn approve(conn: &mut SqliteConnection, retailer_id: i32, merchant_id: &str) -> SyncResult<Retailer> {
    let saved = diesel::update(retailers::table.find(retailer_id))
        .set((
            retailers::status.eq(STATUS_APPROVED),
            retailers::merchant_id.eq(merchant_id),
            retailers::oauth_state.eq(None::<String>),
            retailers::updated_at.eq(tz::now_rfc3339()),
        ))
        .returning(Retailer::as_returning())
        .get_result(conn)?;
    Ok(saved)
}

/// Claim the retailer's sync slot. Returns `false` if a chain already runs.
pub fn try_start_sync(conn: &mut SqliteConnection, retailer_id: i32) -> SyncResult<bool> {
    let n = diesel::update(
        retailers::table
            .find(retailer_id)
            .filter(retailers::is_sync.eq(false)),
    )
    .set(retailers::is_sync.eq(true))
    .execute(conn)?;
    Ok(n == 1)
}

pub fn finish_sync(conn: &mut SqliteConnection, retailer_id: i32) -> SyncResult<()> {
    diesel::update(retailers::table.find(retailer_id))
        .set(retailers::is_sync.eq(false))
        .execute(conn)?;
    Ok(())
}

/// Stored credentials of one retailer. Secrets are redacted from `Debug`.
#[derive(Debug)]
pub struct Credentials {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub token_type: String,
    /// Stored issue timestamp; the guard value for conditional writes.
    pub created_at: String,
    pub expires_at: DateTime<Utc>,
}

impl Credentials {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Opaque storage of provider tokens.
pub trait CredentialStore: Send + Sync {
    fn get(&self, conn: &mut SqliteConnection, retailer_id: i32) -> SyncResult<Option<Credentials>>;

    /// Persist `grant` as issued at `issued_at`.
    ///
    /// With `expected_created_at`, the write only lands if the stored token is
    /// still the one that was read; returns `false` when another writer won.
    fn set(
        &self,
        conn: &mut SqliteConnection,
        retailer_id: i32,
        grant: &TokenGrant,
        issued_at: DateTime<Utc>,
        expected_created_at: Option<&str>,
    ) -> SyncResult<bool>;

    /// Drop every token field, disconnecting the retailer.
    fn clear(&self, conn: &mut SqliteConnection, retailer_id: i32) -> SyncResult<()>;
}

/// [`CredentialStore`] over the `retailers` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteCredentialStore;

#[derive(AsChangeset, Debug)]
#[diesel(table_name = retailers, treat_none_as_null = true)]
struct TokenChange<'a> {
    access_token: Option<&'a str>,
    refresh_token: Option<&'a str>,
    token_type: Option<&'a str>,
    token_created_at: Option<&'a str>,
    expires_at: Option<&'a str>,
    updated_at: &'a str,
}

impl CredentialStore for SqliteCredentialStore {
    fn get(&self, conn: &mut SqliteConnection, retailer_id: i32) -> SyncResult<Option<Credentials>> {
        let retailer = get_retailer(conn, retailer_id)?;
        let (Some(access), Some(token_type), Some(created_at), Some(expires_at)) = (
            retailer.access_token,
            retailer.token_type,
            retailer.token_created_at,
            retailer.expires_at,
        ) else {
            return Ok(None);
        };
        Ok(Some(Credentials {
            access_token: SecretString::from(access),
            refresh_token: retailer.refresh_token.map(SecretString::from),
            token_type,
            created_at,
            expires_at: tz::parse_stored(&expires_at)?,
        }))
    }

    fn set(
        &self,
        conn: &mut SqliteConnection,
        retailer_id: i32,
        grant: &TokenGrant,
        issued_at: DateTime<Utc>,
        expected_created_at: Option<&str>,
    ) -> SyncResult<bool> {
        let created = tz::to_rfc3339_millis(issued_at);
        let expires = tz::to_rfc3339_millis(grant.expires_at);
        let now = tz::now_rfc3339();
        let change = TokenChange {
            access_token: Some(grant.access_token.expose_secret()),
            refresh_token: grant.refresh_token.as_ref().map(|t| t.expose_secret()),
            token_type: Some(grant.token_type.as_str()),
            token_created_at: Some(&created),
            expires_at: Some(&expires),
            updated_at: &now,
        };

        let n = match expected_created_at {
            Some(expected) => diesel::update(
                retailers::table
                    .find(retailer_id)
                    .filter(retailers::token_created_at.eq(expected)),
            )
            .set(&change)
            .execute(conn)?,
            None => diesel::update(retailers::table.find(retailer_id))
                .set(&change)
                .execute(conn)?,
        };
        Ok(n == 1)
    }

    fn clear(&self, conn: &mut SqliteConnection, retailer_id: i32) -> SyncResult<()> {
        let now = tz::now_rfc3339();
        diesel::update(retailers::table.find(retailer_id))
            .set(&TokenChange {
                access_token: None,
                refresh_token: None,
                token_type: None,
                token_created_at: None,
                expires_at: None,
                updated_at: &now,
            })
            .execute(conn)?;
        Ok(())
    }
}
