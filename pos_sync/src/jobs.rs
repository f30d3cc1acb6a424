//! Scheduled units of work and their retry bookkeeping.
//!
//! ## What this does
//! - Drives inventory chains page by page ([`run_inventory_chain`]), holding
//!   the retailer's `is_sync` slot for the duration.
//! - Runs the periodic customer and order polls for every syncable retailer.
//! - Retries transient failures with a fixed delay; a unit that exhausts its
//!   attempts is written to `failed_tasks` and logged at `error` on the
//!   [`OPS_TARGET`] target.

use std::time::Duration;

use diesel::SqliteConnection;
use pos_client::models::Origin;
use serde_json::json;

use crate::{
    config::JobsCfg,
    context::SyncContext,
    customers,
    error::{FailureKind, SyncResult},
    inventory::{self, PageStats, SyncCursor, SyncMode},
    orders,
    repo::{failed_tasks, retailers},
};

/// Log target for failures an operator has to look at.
pub const OPS_TARGET: &str = "pos_sync::ops";

pub const KIND_INVENTORY_PAGE: &str = "inventory_page";
pub const KIND_CUSTOMER_SYNC: &str = "customer_sync";
pub const KIND_ORDER_SYNC: &str = "order_sync";
pub const KIND_WEBHOOK_EVENT: &str = "webhook_event";

/// Attempt budget of one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first one.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &JobsCfg) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            delay: Duration::from_secs(cfg.retry_delay_secs),
        }
    }

    /// Whether a failure of `kind` after `attempts` tries should be retried.
    pub fn should_retry(&self, kind: FailureKind, attempts: u32) -> bool {
        kind.is_retryable() && attempts < self.max_attempts
    }
}

/// Result of [`retry`]: the last result and how many attempts it took.
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: SyncResult<T>,
    pub attempts: u32,
}

/// Run `op` until it succeeds, fails permanently or runs out of attempts.
pub async fn retry<T>(
    policy: &RetryPolicy,
    mut op: impl AsyncFnMut() -> SyncResult<T>,
) -> Attempted<T> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match op().await {
            Err(e) if policy.should_retry(e.kind(), attempts) => {
                tracing::warn!(attempts, error = %e, "transient failure, retrying");
                tokio::time::sleep(policy.delay).await;
            }
            result => return Attempted { result, attempts },
        }
    }
}

/// Persist a unit that exhausted its attempts and raise it to operators.
pub fn give_up(
    conn: &mut SqliteConnection,
    kind: &str,
    retailer_id: Option<i32>,
    payload: &serde_json::Value,
    attempts: u32,
    error: &str,
) {
    tracing::error!(
        target: OPS_TARGET,
        kind,
        retailer_id,
        attempts,
        error,
        "task failed permanently"
    );
    if let Err(e) = failed_tasks::record_failed_task(
        conn,
        kind,
        retailer_id,
        &payload.to_string(),
        attempts,
        error,
    ) {
        tracing::error!(target: OPS_TARGET, kind, retailer_id, error = %e, "failed task not recorded");
    }
}

/// How an inventory chain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStatus {
    Completed,
    /// Another chain holds the retailer's sync slot.
    Busy,
    Failed(FailureKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainReport {
    pub status: ChainStatus,
    pub pages: usize,
    pub totals: PageStats,
}

fn add_stats(totals: &mut PageStats, page: &PageStats) {
    totals.objects += page.objects;
    totals.products += page.products;
    totals.variants += page.variants;
    totals.categories += page.categories;
    totals.images += page.images;
    totals.deleted += page.deleted;
}

/// Run every page of a retailer's catalog chain.
///
/// Pages run sequentially. A transiently failing page is retried from the
/// same cursor; a page that keeps failing ends the chain and is recorded as a
/// failed task. At most one chain runs per retailer.
pub async fn run_inventory_chain(
    ctx: &SyncContext,
    conn: &mut SqliteConnection,
    retailer_id: i32,
    mode: SyncMode,
) -> SyncResult<ChainReport> {
    if !retailers::try_start_sync(conn, retailer_id)? {
        tracing::info!(retailer_id, "inventory sync already running");
        return Ok(ChainReport {
            status: ChainStatus::Busy,
            pages: 0,
            totals: PageStats::default(),
        });
    }
    let report = drive_chain(ctx, conn, retailer_id, mode).await;
    retailers::finish_sync(conn, retailer_id)?;
    tracing::info!(
        retailer_id,
        status = ?report.status,
        pages = report.pages,
        products = report.totals.products,
        variants = report.totals.variants,
        "inventory chain finished"
    );
    Ok(report)
}

async fn drive_chain(
    ctx: &SyncContext,
    conn: &mut SqliteConnection,
    retailer_id: i32,
    mode: SyncMode,
) -> ChainReport {
    let policy = RetryPolicy::from_config(&ctx.config.jobs);
    let mut totals = PageStats::default();
    let mut pages = 0;
    let mut cursor = SyncCursor::start(retailer_id);
    let mut attempts = 0;
    loop {
        attempts += 1;
        let outcome = inventory::run_page(ctx, conn, &cursor, mode).await;
        if outcome.success {
            pages += 1;
            attempts = 0;
            add_stats(&mut totals, &outcome.stats);
            match outcome.next {
                Some(next) => cursor = next,
                None => {
                    return ChainReport {
                        status: ChainStatus::Completed,
                        pages,
                        totals,
                    };
                }
            }
            continue;
        }

        let kind = outcome.failure.unwrap_or(FailureKind::Permanent);
        if policy.should_retry(kind, attempts) {
            tokio::time::sleep(policy.delay).await;
            continue;
        }
        give_up(
            conn,
            KIND_INVENTORY_PAGE,
            Some(retailer_id),
            &json!({ "cursor": cursor, "mode": mode }),
            attempts,
            outcome.error.as_deref().unwrap_or("unknown error"),
        );
        return ChainReport {
            status: ChainStatus::Failed(kind),
            pages,
            totals,
        };
    }
}

/// Counters of a job run over many retailers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Full inventory chain for every syncable retailer.
pub async fn inventory_sync_all(
    ctx: &SyncContext,
    conn: &mut SqliteConnection,
    origin: Option<Origin>,
) -> SyncResult<JobSummary> {
    let mut summary = JobSummary::default();
    for retailer in retailers::syncable_retailers(conn, origin)? {
        let report = run_inventory_chain(ctx, conn, retailer.id, SyncMode::Full).await?;
        match report.status {
            ChainStatus::Completed => summary.succeeded += 1,
            ChainStatus::Busy => summary.skipped += 1,
            ChainStatus::Failed(_) => summary.failed += 1,
        }
    }
    Ok(summary)
}

/// Customer listing for every syncable retailer.
pub async fn customer_sync_all(
    ctx: &SyncContext,
    conn: &mut SqliteConnection,
    origin: Option<Origin>,
) -> SyncResult<JobSummary> {
    let policy = RetryPolicy::from_config(&ctx.config.jobs);
    let mut summary = JobSummary::default();
    for retailer in retailers::syncable_retailers(conn, origin)? {
        let retailer_id = retailer.id;
        let attempted = retry(&policy, async || {
            customers::sync_customers(ctx, conn, retailer_id).await
        })
        .await;
        match attempted.result {
            Ok(_) => summary.succeeded += 1,
            Err(e) => {
                summary.failed += 1;
                give_up(
                    conn,
                    KIND_CUSTOMER_SYNC,
                    Some(retailer_id),
                    &json!({ "retailer_id": retailer_id }),
                    attempted.attempts,
                    &e.to_string(),
                );
            }
        }
    }
    Ok(summary)
}

/// Order poll for every syncable retailer.
pub async fn order_sync_all(
    ctx: &SyncContext,
    conn: &mut SqliteConnection,
    origin: Option<Origin>,
) -> SyncResult<JobSummary> {
    let policy = RetryPolicy::from_config(&ctx.config.jobs);
    let mut summary = JobSummary::default();
    for retailer in retailers::syncable_retailers(conn, origin)? {
        let retailer_id = retailer.id;
        let attempted = retry(&policy, async || {
            orders::sync_orders(ctx, conn, retailer_id).await
        })
        .await;
        match attempted.result {
            Ok(report) if report.failed == 0 => summary.succeeded += 1,
            Ok(_) => summary.failed += 1,
            Err(e) => {
                summary.failed += 1;
                give_up(
                    conn,
                    KIND_ORDER_SYNC,
                    Some(retailer_id),
                    &json!({ "retailer_id": retailer_id }),
                    attempted.attempts,
                    &e.to_string(),
                );
            }
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_failures_are_retried() {
        let policy = RetryPolicy {
            max_attempts: 3,
            delay: Duration::ZERO,
        };
        assert!(policy.should_retry(FailureKind::Transient, 1));
        assert!(policy.should_retry(FailureKind::Transient, 2));
        assert!(!policy.should_retry(FailureKind::Transient, 3));
        assert!(!policy.should_retry(FailureKind::AuthExpired, 1));
        assert!(!policy.should_retry(FailureKind::Permanent, 1));
    }

    #[test]
    fn zero_attempts_config_still_runs_once() {
        let policy = RetryPolicy::from_config(&JobsCfg {
            max_attempts: 0,
            retry_delay_secs: 1,
        });
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.delay, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn retry_stops_after_budget() {
        let policy = RetryPolicy {
            max_attempts: 3,
            delay: Duration::ZERO,
        };
        let mut calls = 0;
        let attempted: Attempted<()> = retry(&policy, async || {
            calls += 1;
            Err(pos_client::ProviderError::Timeout.into())
        })
        .await;
        assert!(attempted.result.is_err());
        assert_eq!(attempted.attempts, 3);
        assert_eq!(calls, 3);
    }
}
