//! Inbound provider webhooks.
//!
//! ## What this does
//! - [`WebhookDispatcher::accept`] parses the provider envelope, resolves the
//!   approved retailer behind each event and claims the event in the
//!   idempotency store. Events for unknown or unapproved merchants are
//!   ignored without error.
//! - [`WebhookDispatcher::process`] routes claimed events to the engines and
//!   marks them `SUCCESS`. Routing is retried like any other job; an event
//!   that still fails is written to `failed_tasks` and released so a
//!   redelivery can retry it.
//!
//! ## Idempotency
//! Events are keyed by (`merchant_id`, `event_id`). A second delivery while
//! the first is still `PROCESSING` is answered with [`WebhookReject::RetryLater`]
//! (HTTP 425); a delivery of a finished event is acknowledged without work.

mod clover;
mod square;

use chrono::{DateTime, Utc};
use diesel::SqliteConnection;
use pos_client::models::Origin;
use serde_json::json;

use crate::{
    context::SyncContext,
    customers,
    error::{FailureKind, SyncError, SyncResult},
    inventory::{self, SyncMode},
    jobs::{self, ChainStatus, KIND_WEBHOOK_EVENT, OPS_TARGET, RetryPolicy},
    locations, orders,
    repo::{
        retailers,
        webhook_events::{self, Claim},
    },
};

/// Work an event asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookAction {
    SyncItem(String),
    DeleteItem(String),
    /// Incremental catalog chain from `since`.
    CatalogChanged { since: DateTime<Utc> },
    /// (variant id, location id) pairs whose stock changed.
    StockChanged(Vec<(String, String)>),
    UpsertCategory(String),
    DeleteCategory(String),
    UpsertCustomer(String),
    DeleteCustomer(String),
    ReconcileOrder(String),
    RefreshLocations,
    Ignore,
}

/// One provider event, parsed but not yet attributed to a retailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingEvent {
    pub merchant_id: String,
    /// Application the event was sent for, when the provider says.
    pub app_id: Option<String>,
    pub event_id: String,
    pub event_type: String,
    pub action: WebhookAction,
}

/// An event this delivery owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedEvent {
    pub retailer_id: i32,
    pub event: IncomingEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookAck {
    Processed,
    /// Every event was already processed.
    Duplicate,
    /// Nothing in the delivery concerns a connected retailer.
    Ignored,
    /// Clover endpoint verification ping.
    Verified,
}

impl WebhookAck {
    pub fn as_str(self) -> &'static str {
        match self {
            WebhookAck::Processed => "processed",
            WebhookAck::Duplicate => "duplicate",
            WebhookAck::Ignored => "ignored",
            WebhookAck::Verified => "verified",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookReject {
    #[error("malformed webhook: {0}")]
    Malformed(String),
    #[error("event is still being processed")]
    RetryLater,
    #[error("webhook failed: {0}")]
    Internal(String),
}

impl WebhookReject {
    pub fn status_code(&self) -> u16 {
        match self {
            WebhookReject::Malformed(_) => 400,
            WebhookReject::RetryLater => 425,
            WebhookReject::Internal(_) => 500,
        }
    }
}

impl From<SyncError> for WebhookReject {
    fn from(e: SyncError) -> Self {
        WebhookReject::Internal(e.to_string())
    }
}

/// Result of [`WebhookDispatcher::accept`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Accepted {
    pub claimed: Vec<ClaimedEvent>,
    pub in_progress: usize,
    pub duplicates: usize,
    pub ignored: usize,
    pub verified: bool,
}

impl Accepted {
    /// Answer owed to the provider for this delivery.
    pub fn response(&self) -> Result<WebhookAck, WebhookReject> {
        if self.verified {
            Ok(WebhookAck::Verified)
        } else if self.in_progress > 0 {
            Err(WebhookReject::RetryLater)
        } else if !self.claimed.is_empty() {
            Ok(WebhookAck::Processed)
        } else if self.duplicates > 0 {
            Ok(WebhookAck::Duplicate)
        } else {
            Ok(WebhookAck::Ignored)
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessReport {
    pub processed: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct WebhookDispatcher {
    ctx: SyncContext,
}

impl WebhookDispatcher {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    /// Parse a delivery and claim the events this process should handle.
    pub fn accept(
        &self,
        conn: &mut SqliteConnection,
        origin: Origin,
        body: &[u8],
    ) -> Result<Accepted, WebhookReject> {
        let events = match origin {
            Origin::Square => vec![square::parse(body)?],
            Origin::Clover => match clover::parse(body)? {
                clover::Parsed::Verification(code) => {
                    tracing::info!(target: OPS_TARGET, verification_code = %code, "clover webhook verification");
                    return Ok(Accepted {
                        verified: true,
                        ..Accepted::default()
                    });
                }
                clover::Parsed::Events(events) => events,
            },
        };

        let ttl = chrono::Duration::seconds(self.ctx.config.webhooks.processing_ttl_secs);
        let mut accepted = Accepted::default();
        for event in events {
            if event.action == WebhookAction::Ignore {
                tracing::debug!(event_type = %event.event_type, "unhandled webhook event");
                accepted.ignored += 1;
                continue;
            }
            let retailer = retailers::find_approved_by_merchant(
                conn,
                origin,
                &event.merchant_id,
                event.app_id.as_deref(),
            )?;
            let Some(retailer) = retailer else {
                tracing::info!(merchant_id = %event.merchant_id, event_id = %event.event_id, "webhook for unknown merchant ignored");
                accepted.ignored += 1;
                continue;
            };

            match webhook_events::claim(
                conn,
                &event.merchant_id,
                &event.event_id,
                &event.event_type,
                Utc::now(),
                ttl,
            )? {
                Claim::Claimed => accepted.claimed.push(ClaimedEvent {
                    retailer_id: retailer.id,
                    event,
                }),
                Claim::InProgress => {
                    tracing::info!(event_id = %event.event_id, "webhook event already in progress");
                    accepted.in_progress += 1;
                }
                Claim::Done => {
                    tracing::debug!(event_id = %event.event_id, "webhook event already processed");
                    accepted.duplicates += 1;
                }
            }
        }
        Ok(accepted)
    }

    /// Route claimed events and settle their idempotency records.
    ///
    /// Each event gets the job retry budget. An event that still fails is
    /// recorded as a failed task and its claim released, so a redelivery can
    /// run it again.
    pub async fn process(
        &self,
        conn: &mut SqliteConnection,
        claimed: Vec<ClaimedEvent>,
    ) -> ProcessReport {
        let policy = RetryPolicy::from_config(&self.ctx.config.jobs);
        let mut report = ProcessReport::default();
        for claimed in claimed {
            let ClaimedEvent { retailer_id, event } = claimed;
            let mut attempts = 0;
            let result = loop {
                attempts += 1;
                match self.route(conn, retailer_id, &event.action).await {
                    Err(e) if policy.should_retry(e.kind(), attempts) => {
                        tracing::warn!(retailer_id, event_id = %event.event_id, attempts, error = %e, "webhook event failed, retrying");
                        tokio::time::sleep(policy.delay).await;
                    }
                    result => break result,
                }
            };
            match result {
                Ok(()) => {
                    report.processed += 1;
                    if let Err(e) = webhook_events::mark_success(conn, &event.merchant_id, &event.event_id) {
                        tracing::error!(retailer_id, event_id = %event.event_id, error = %e, "webhook event not marked done");
                    }
                    tracing::info!(retailer_id, event_id = %event.event_id, event_type = %event.event_type, "webhook event processed");
                }
                Err(e) => {
                    report.failed += 1;
                    if let Err(release_err) = webhook_events::release(conn, &event.merchant_id, &event.event_id) {
                        tracing::error!(retailer_id, event_id = %event.event_id, error = %release_err, "webhook claim not released");
                    }
                    jobs::give_up(
                        conn,
                        KIND_WEBHOOK_EVENT,
                        Some(retailer_id),
                        &json!({
                            "merchant_id": event.merchant_id,
                            "event_id": event.event_id,
                            "event_type": event.event_type,
                        }),
                        attempts,
                        &e.to_string(),
                    );
                }
            }
        }
        report
    }

    /// [`accept`](Self::accept) then [`process`](Self::process) in the caller's task.
    pub async fn handle(
        &self,
        conn: &mut SqliteConnection,
        origin: Origin,
        body: &[u8],
    ) -> Result<WebhookAck, WebhookReject> {
        let mut accepted = self.accept(conn, origin, body)?;
        let claimed = std::mem::take(&mut accepted.claimed);
        let processed_any = !claimed.is_empty();
        let report = self.process(conn, claimed).await;
        if report.failed > 0 {
            return Err(WebhookReject::Internal(format!(
                "{} of {} events failed",
                report.failed,
                report.failed + report.processed
            )));
        }
        if processed_any && accepted.in_progress == 0 {
            return Ok(WebhookAck::Processed);
        }
        accepted.response()
    }

    async fn route(
        &self,
        conn: &mut SqliteConnection,
        retailer_id: i32,
        action: &WebhookAction,
    ) -> SyncResult<()> {
        let ctx = &self.ctx;
        match action {
            WebhookAction::SyncItem(id) => {
                inventory::sync_item(ctx, conn, retailer_id, id).await?;
            }
            WebhookAction::DeleteItem(id) => {
                inventory::delete_item(conn, retailer_id, id)?;
            }
            WebhookAction::CatalogChanged { since } => {
                let mode = SyncMode::Incremental { since: *since };
                let report = jobs::run_inventory_chain(ctx, conn, retailer_id, mode).await?;
                let kind = match report.status {
                    ChainStatus::Completed => return Ok(()),
                    ChainStatus::Busy => FailureKind::Transient,
                    ChainStatus::Failed(kind) => kind,
                };
                return Err(SyncError::Incomplete {
                    what: format!("incremental catalog chain ({:?})", report.status),
                    kind,
                });
            }
            WebhookAction::StockChanged(counts) => {
                for (item_id, location_id) in counts {
                    inventory::apply_stock_update(ctx, conn, retailer_id, item_id, location_id)
                        .await?;
                }
            }
            WebhookAction::UpsertCategory(id) => {
                inventory::upsert_category(ctx, conn, retailer_id, id).await?;
            }
            WebhookAction::DeleteCategory(id) => {
                inventory::delete_category(conn, retailer_id, id)?;
            }
            WebhookAction::UpsertCustomer(id) => {
                customers::sync_customer(ctx, conn, retailer_id, id).await?;
            }
            WebhookAction::DeleteCustomer(id) => {
                customers::delete_customer(conn, retailer_id, id)?;
            }
            WebhookAction::ReconcileOrder(id) => {
                orders::reconcile_order(ctx, conn, retailer_id, id).await?;
            }
            WebhookAction::RefreshLocations => {
                locations::sync_locations(ctx, conn, retailer_id).await?;
            }
            WebhookAction::Ignore => {}
        }
        Ok(())
    }
}
