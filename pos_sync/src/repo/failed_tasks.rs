use diesel::prelude::*;

use crate::{error::SyncResult, models::FailedTask, schema::failed_tasks, tz};

#[derive(Insertable, Debug)]
#[diesel(table_name = failed_tasks)]
struct FailedTaskRow<'a> {
    kind: &'a str,
    retailer_id: Option<i32>,
    payload: &'a str,
    attempts: i32,
    last_error: &'a str,
    failed_at: &'a str,
}

/// Record a unit of work that exhausted its retries.
pub fn record_failed_task(
    conn: &mut SqliteConnection,
    kind: &str,
    retailer_id: Option<i32>,
    payload: &str,
    attempts: u32,
    last_error: &str,
) -> SyncResult<FailedTask> {
    let now = tz::now_rfc3339();
    let saved = diesel::insert_into(failed_tasks::table)
        .values(&FailedTaskRow {
            kind,
            retailer_id,
            payload,
            attempts: i32::try_from(attempts).unwrap_or(i32::MAX),
            last_error,
            failed_at: &now,
        })
        .returning(FailedTask::as_returning())
        .get_result(conn)?;
    Ok(saved)
}

pub fn list_failed_tasks(conn: &mut SqliteConnection) -> SyncResult<Vec<FailedTask>> {
    let rows = failed_tasks::table
        .order(failed_tasks::id)
        .select(FailedTask::as_select())
        .load(conn)?;
    Ok(rows)
}
