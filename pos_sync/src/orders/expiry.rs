//! Reservation expiry sweep.

use chrono::{DateTime, Utc};
use diesel::SqliteConnection;

use crate::{
    error::{SyncError, SyncResult},
    repo::{expiry, orders},
    tz,
};

/// Expire every reservation whose task is due. Returns the number of
/// reservations moved to `EXPIRED`.
///
/// Each task is consumed in its own transaction and the status change is
/// conditional on the reservation still being `RESERVED` past its time
/// limit, so overlapping sweeps transition a reservation at most once.
pub fn sweep(conn: &mut SqliteConnection, now: DateTime<Utc>) -> SyncResult<usize> {
    let now = tz::to_rfc3339_millis(now);
    let due = expiry::due_tasks(conn, &now)?;
    let mut expired = 0;
    for task in due {
        let changed = conn.immediate_transaction::<_, SyncError, _>(|conn| {
            let changed = orders::expire_if_due(conn, task.reservation_id, &now)?;
            expiry::mark_fired(conn, task.reservation_id, &now)?;
            Ok(changed)
        })?;
        if changed {
            tracing::info!(reservation_id = task.reservation_id, "reservation expired");
            expired += 1;
        }
    }
    Ok(expired)
}
