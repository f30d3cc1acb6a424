//! HTTP surface: provider webhooks and OAuth callbacks.
//!
//! Routes:
//! - `POST /webhooks/square`, `POST /webhooks/clover`: the idempotency claim
//!   is taken before answering; routing runs on a spawned task.
//! - `GET /oauth/square/callback?code&state`
//! - `GET /oauth/clover/callback/{retailer_id}?code&merchant_id`
//!
//! Every request opens its own SQLite connection.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use diesel::SqliteConnection;
use pos_client::models::Origin;
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    context::SyncContext,
    db::connection::connect_sqlite,
    error::SyncError,
    inventory::SyncMode,
    jobs, locations, oauth,
    webhook::{WebhookAck, WebhookDispatcher, WebhookReject},
};

/// Shared state of the router.
#[derive(Clone)]
pub struct AppState {
    database_url: Arc<str>,
    dispatcher: WebhookDispatcher,
}

impl AppState {
    pub fn new(database_url: &str, ctx: SyncContext) -> Self {
        Self {
            database_url: Arc::from(database_url),
            dispatcher: WebhookDispatcher::new(ctx),
        }
    }

    fn ctx(&self) -> &SyncContext {
        self.dispatcher.context()
    }

    fn connect(&self) -> Result<SqliteConnection, ApiError> {
        connect_sqlite(&self.database_url).map_err(|e| {
            tracing::error!(error = %e, "database connection failed");
            ApiError::Internal
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhooks/square", post(square_webhook))
        .route("/webhooks/clover", post(clover_webhook))
        .route("/oauth/square/callback", get(square_callback))
        .route("/oauth/clover/callback/{retailer_id}", get(clover_callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve [`router`] until the process is stopped.
pub async fn serve(state: AppState, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(bind, "listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Failures answered to the caller.
#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Webhook(WebhookReject),
    Upstream,
    Internal,
}

impl From<SyncError> for ApiError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Validation(msg) => ApiError::BadRequest(msg),
            e @ SyncError::NotFound { .. } => ApiError::BadRequest(e.to_string()),
            SyncError::Provider(e) => {
                tracing::warn!(error = %e, "provider call failed");
                ApiError::Upstream
            }
            e => {
                tracing::error!(error = %e, "request failed");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Webhook(reject) => {
                let status = StatusCode::from_u16(reject.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, reject.to_string())
            }
            ApiError::Upstream => (StatusCode::BAD_GATEWAY, "provider unavailable".to_string()),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            ),
        };
        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}

async fn square_webhook(State(state): State<AppState>, body: Bytes) -> Response {
    receive_webhook(state, Origin::Square, body).await
}

async fn clover_webhook(State(state): State<AppState>, body: Bytes) -> Response {
    receive_webhook(state, Origin::Clover, body).await
}

async fn receive_webhook(state: AppState, origin: Origin, body: Bytes) -> Response {
    let accepting = state.clone();
    let accepted = tokio::task::spawn_blocking(move || {
        let mut conn = accepting.connect()?;
        let accepted = accepting
            .dispatcher
            .accept(&mut conn, origin, &body)
            .map_err(ApiError::Webhook)?;
        Ok::<_, ApiError>((conn, accepted))
    })
    .await;

    let (mut conn, mut accepted) = match accepted {
        Ok(Ok(pair)) => pair,
        Ok(Err(e)) => return e.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "webhook accept task panicked");
            return ApiError::Internal.into_response();
        }
    };

    let claimed = std::mem::take(&mut accepted.claimed);
    let response = if claimed.is_empty() {
        accepted.response()
    } else if accepted.in_progress > 0 {
        Err(WebhookReject::RetryLater)
    } else {
        Ok(WebhookAck::Processed)
    };
    if !claimed.is_empty() {
        let dispatcher = state.dispatcher.clone();
        tokio::spawn(async move {
            dispatcher.process(&mut conn, claimed).await;
        });
    }

    match response {
        Ok(ack) => (
            StatusCode::OK,
            Json(json!({ "success": true, "result": ack.as_str() })),
        )
            .into_response(),
        Err(reject) => ApiError::Webhook(reject).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct SquareCallback {
    code: Option<String>,
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CloverCallback {
    code: Option<String>,
    merchant_id: Option<String>,
}

fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("missing {name}")))
}

async fn square_callback(
    State(state): State<AppState>,
    Query(query): Query<SquareCallback>,
) -> Result<Response, ApiError> {
    let code = required(query.code, "code")?;
    let oauth_state = required(query.state, "state")?;
    let mut conn = state.connect()?;
    let retailer =
        oauth::complete_square_callback(state.ctx(), &mut conn, &code, &oauth_state).await?;
    spawn_initial_sync(&state, retailer.id);
    Ok(connected(retailer.id))
}

async fn clover_callback(
    State(state): State<AppState>,
    Path(retailer_id): Path<i32>,
    Query(query): Query<CloverCallback>,
) -> Result<Response, ApiError> {
    let code = required(query.code, "code")?;
    let merchant_id = required(query.merchant_id, "merchant_id")?;
    let mut conn = state.connect()?;
    let retailer =
        oauth::complete_clover_callback(state.ctx(), &mut conn, retailer_id, &code, &merchant_id)
            .await?;
    spawn_initial_sync(&state, retailer.id);
    Ok(connected(retailer.id))
}

fn connected(retailer_id: i32) -> Response {
    (
        StatusCode::OK,
        Json(json!({ "success": true, "retailer_id": retailer_id })),
    )
        .into_response()
}

// Location refresh then the first full catalog chain of a new connection.
fn spawn_initial_sync(state: &AppState, retailer_id: i32) {
    let state = state.clone();
    tokio::spawn(async move {
        let Ok(mut conn) = state.connect() else {
            return;
        };
        if let Err(e) = locations::sync_locations(state.ctx(), &mut conn, retailer_id).await {
            tracing::warn!(retailer_id, error = %e, "initial location refresh failed");
        }
        match jobs::run_inventory_chain(state.ctx(), &mut conn, retailer_id, SyncMode::Full).await
        {
            Ok(report) => tracing::info!(retailer_id, status = ?report.status, "initial inventory sync finished"),
            Err(e) => tracing::warn!(retailer_id, error = %e, "initial inventory sync failed"),
        }
    });
}
