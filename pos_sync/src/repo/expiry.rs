//! Scheduled expiry of reservations.

use diesel::prelude::*;

use crate::{error::SyncResult, models::ExpiryTask, schema::expiry_tasks};

/// Schedule (or reschedule) the expiry of a reservation.
pub fn schedule(conn: &mut SqliteConnection, reservation_id: i32, fire_at: &str) -> SyncResult<()> {
    diesel::insert_into(expiry_tasks::table)
        .values((
            expiry_tasks::reservation_id.eq(reservation_id),
            expiry_tasks::fire_at.eq(fire_at),
        ))
        .on_conflict(expiry_tasks::reservation_id)
        .do_update()
        .set((
            expiry_tasks::fire_at.eq(fire_at),
            expiry_tasks::fired_at.eq(None::<String>),
        ))
        .execute(conn)?;
    Ok(())
}

/// Tasks not fired yet whose time has come.
pub fn due_tasks(conn: &mut SqliteConnection, now: &str) -> SyncResult<Vec<ExpiryTask>> {
    let rows = expiry_tasks::table
        .filter(expiry_tasks::fired_at.is_null())
        .filter(expiry_tasks::fire_at.le(now))
        .order(expiry_tasks::fire_at)
        .select(ExpiryTask::as_select())
        .load(conn)?;
    Ok(rows)
}

/// Stamp a task as fired. Returns `false` if it already was.
pub fn mark_fired(conn: &mut SqliteConnection, reservation_id: i32, now: &str) -> SyncResult<bool> {
    let n = diesel::update(
        expiry_tasks::table
            .find(reservation_id)
            .filter(expiry_tasks::fired_at.is_null()),
    )
    .set(expiry_tasks::fired_at.eq(now))
    .execute(conn)?;
    Ok(n == 1)
}

pub fn get_task(conn: &mut SqliteConnection, reservation_id: i32) -> SyncResult<Option<ExpiryTask>> {
    let row = expiry_tasks::table
        .find(reservation_id)
        .select(ExpiryTask::as_select())
        .first(conn)
        .optional()?;
    Ok(row)
}
