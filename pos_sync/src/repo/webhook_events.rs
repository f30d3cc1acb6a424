//! Idempotency records for inbound webhook events.
//!
//! An event is claimed by inserting a `PROCESSING` row keyed by
//! (`merchant_id`, `event_id`). The insert is the race arbiter: of two
//! concurrent deliveries exactly one inserts. A claim whose holder died is
//! reclaimable once older than the processing TTL.

use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;

use crate::{error::SyncResult, schema::webhook_events, tz};

pub const STATE_PROCESSING: &str = "PROCESSING";
pub const STATE_SUCCESS: &str = "SUCCESS";

/// Result of trying to claim an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The caller owns the event and must process it.
    Claimed,
    /// Another delivery is processing it.
    InProgress,
    /// Already processed.
    Done,
}

pub fn claim(
    conn: &mut SqliteConnection,
    merchant_id: &str,
    event_id: &str,
    event_type: &str,
    now: DateTime<Utc>,
    processing_ttl: Duration,
) -> SyncResult<Claim> {
    let now_s = tz::to_rfc3339_millis(now);
    let inserted = diesel::insert_into(webhook_events::table)
        .values((
            webhook_events::merchant_id.eq(merchant_id),
            webhook_events::event_id.eq(event_id),
            webhook_events::event_type.eq(event_type),
            webhook_events::state.eq(STATE_PROCESSING),
            webhook_events::updated_at.eq(&now_s),
        ))
        .on_conflict((webhook_events::merchant_id, webhook_events::event_id))
        .do_nothing()
        .execute(conn)?;
    if inserted == 1 {
        return Ok(Claim::Claimed);
    }

    let key = || webhook_events::table.find((merchant_id, event_id));
    let Some((state, updated_at)) = key()
        .select((webhook_events::state, webhook_events::updated_at))
        .first::<(String, String)>(conn)
        .optional()?
    else {
        // released between the insert and the read
        return Ok(Claim::InProgress);
    };
    if state == STATE_SUCCESS {
        return Ok(Claim::Done);
    }

    let stale_before = tz::to_rfc3339_millis(now - processing_ttl);
    if updated_at > stale_before {
        return Ok(Claim::InProgress);
    }
    let reclaimed = diesel::update(
        key()
            .filter(webhook_events::state.eq(STATE_PROCESSING))
            .filter(webhook_events::updated_at.eq(&updated_at)),
    )
    .set(webhook_events::updated_at.eq(&now_s))
    .execute(conn)?;
    Ok(if reclaimed == 1 {
        Claim::Claimed
    } else {
        Claim::InProgress
    })
}

pub fn mark_success(conn: &mut SqliteConnection, merchant_id: &str, event_id: &str) -> SyncResult<()> {
    diesel::update(webhook_events::table.find((merchant_id, event_id)))
        .set((
            webhook_events::state.eq(STATE_SUCCESS),
            webhook_events::updated_at.eq(tz::now_rfc3339()),
        ))
        .execute(conn)?;
    Ok(())
}

/// Drop a `PROCESSING` claim so a redelivery can retry the event.
pub fn release(conn: &mut SqliteConnection, merchant_id: &str, event_id: &str) -> SyncResult<()> {
    diesel::delete(
        webhook_events::table
            .find((merchant_id, event_id))
            .filter(webhook_events::state.eq(STATE_PROCESSING)),
    )
    .execute(conn)?;
    Ok(())
}

pub fn event_state(
    conn: &mut SqliteConnection,
    merchant_id: &str,
    event_id: &str,
) -> SyncResult<Option<String>> {
    let state = webhook_events::table
        .find((merchant_id, event_id))
        .select(webhook_events::state)
        .first(conn)
        .optional()?;
    Ok(state)
}
