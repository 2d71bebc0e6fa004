use std::time::Duration;

use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{NewOutboxJob, OutboxJob};
use crate::schema::outbox_jobs;

pub const STATUS_QUEUED: &str = "queued";
pub const STATUS_PROCESSING: &str = "processing";
pub const STATUS_SUCCEEDED: &str = "succeeded";
pub const STATUS_FAILED: &str = "failed";

pub const JOB_SEND_EMAIL: &str = "send-email";

#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

pub type OutboxResult<T> = Result<T, OutboxError>;

/// Queues a notification as a durable row instead of sending inline.
/// Callers enqueue inside their own transaction so the notification and
/// the write it announces commit together.
pub fn enqueue_job(
    conn: &mut PgConnection,
    job_type: &str,
    payload: Value,
    run_after: Option<NaiveDateTime>,
) -> Result<OutboxJob, diesel::result::Error> {
    let new_job = NewOutboxJob {
        id: Uuid::new_v4(),
        job_type: job_type.to_string(),
        payload,
        status: STATUS_QUEUED.to_string(),
        run_after: run_after.unwrap_or_else(|| Utc::now().naive_utc()),
    };

    diesel::insert_into(outbox_jobs::table)
        .values(&new_job)
        .execute(conn)?;

    outbox_jobs::table.find(new_job.id).first(conn)
}

pub fn reserve_job(conn: &mut PgConnection, job_types: &[&str]) -> OutboxResult<Option<OutboxJob>> {
    let now = Utc::now().naive_utc();

    conn.transaction(|conn| {
        let job_opt = outbox_jobs::table
            .filter(outbox_jobs::status.eq(STATUS_QUEUED))
            .filter(outbox_jobs::run_after.le(now))
            .filter(outbox_jobs::job_type.eq_any(job_types))
            .order(outbox_jobs::run_after.asc())
            .for_update()
            .skip_locked()
            .first::<OutboxJob>(conn)
            .optional()?;

        if let Some(job) = job_opt {
            diesel::update(outbox_jobs::table.find(job.id))
                .set((
                    outbox_jobs::status.eq(STATUS_PROCESSING),
                    outbox_jobs::attempts.eq(job.attempts + 1),
                    outbox_jobs::updated_at.eq(now),
                ))
                .execute(conn)?;

            let refreshed = outbox_jobs::table.find(job.id).first(conn)?;
            Ok::<Option<OutboxJob>, diesel::result::Error>(Some(refreshed))
        } else {
            Ok::<Option<OutboxJob>, diesel::result::Error>(None)
        }
    })
    .map_err(OutboxError::from)
}

pub fn mark_job_succeeded(conn: &mut PgConnection, job_id: Uuid) -> OutboxResult<()> {
    diesel::update(outbox_jobs::table.find(job_id))
        .set((
            outbox_jobs::status.eq(STATUS_SUCCEEDED),
            outbox_jobs::last_error.eq::<Option<String>>(None),
            outbox_jobs::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;
    Ok(())
}

pub fn retry_job_after(
    conn: &mut PgConnection,
    job_id: Uuid,
    delay: Duration,
    error_message: &str,
) -> OutboxResult<()> {
    let next_run = Utc::now()
        + ChronoDuration::from_std(delay).unwrap_or_else(|_| ChronoDuration::seconds(30));

    diesel::update(outbox_jobs::table.find(job_id))
        .set((
            outbox_jobs::status.eq(STATUS_QUEUED),
            outbox_jobs::run_after.eq(next_run.naive_utc()),
            outbox_jobs::last_error.eq(Some(error_message.to_string())),
            outbox_jobs::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;
    Ok(())
}

pub fn mark_job_failed(
    conn: &mut PgConnection,
    job_id: Uuid,
    error_message: &str,
) -> OutboxResult<()> {
    diesel::update(outbox_jobs::table.find(job_id))
        .set((
            outbox_jobs::status.eq(STATUS_FAILED),
            outbox_jobs::last_error.eq(Some(error_message.to_string())),
            outbox_jobs::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;
    Ok(())
}
