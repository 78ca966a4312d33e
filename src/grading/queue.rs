// src/grading/queue.rs

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tokio::sync::Notify;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_RUNNING: &str = "running";
pub const STATUS_DONE: &str = "done";
pub const STATUS_FAILED: &str = "failed";

/// Longest wait between two attempts of the same job.
const MAX_RETRY_DELAY_MS: i64 = 10 * 60 * 1000;

/// Cloneable handle used to wake the grading worker after a job is enqueued.
///
/// The jobs themselves live in the `grading_jobs` table.
#[derive(Clone, Default)]
pub struct GradingQueue {
    notify: Arc<Notify>,
}

impl GradingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wake(&self) {
        self.notify.notify_one();
    }

    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

/// Represents the 'grading_jobs' table: one request to grade a (test, student) attempt.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingJob {
    pub id: i64,
    pub test_id: i64,
    pub student_id: i64,
    pub status: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub next_attempt_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const JOB_COLUMNS: &str = "id, test_id, student_id, status, attempts, last_error, \
     next_attempt_at, created_at, updated_at";

/// Enqueues grading for an attempt. Re-enqueuing an existing key resets it to pending.
///
/// Meant to run inside the transaction that stores the attempt.
pub async fn enqueue(
    conn: &mut SqliteConnection,
    test_id: i64,
    student_id: i64,
) -> Result<(), sqlx::Error> {
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO grading_jobs (test_id, student_id, status, attempts, next_attempt_at, created_at, updated_at)
        VALUES (?, ?, 'pending', 0, ?, ?, ?)
        ON CONFLICT (test_id, student_id) DO UPDATE SET
            status = 'pending',
            attempts = 0,
            last_error = NULL,
            next_attempt_at = excluded.next_attempt_at,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(test_id)
    .bind(student_id)
    .bind(now)
    .bind(now)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(())
}

/// Atomically moves the oldest ready job to 'running' and counts the attempt.
pub async fn claim_next(pool: &SqlitePool) -> Result<Option<GradingJob>, sqlx::Error> {
    let now = Utc::now();
    let sql = format!(
        r#"
        UPDATE grading_jobs
        SET status = ?, attempts = attempts + 1, updated_at = ?
        WHERE id = (
            SELECT id FROM grading_jobs
            WHERE status = ? AND next_attempt_at <= ?
            ORDER BY next_attempt_at, id
            LIMIT 1
        )
        RETURNING {JOB_COLUMNS}
        "#
    );

    sqlx::query_as::<_, GradingJob>(&sql)
        .bind(STATUS_RUNNING)
        .bind(now)
        .bind(STATUS_PENDING)
        .bind(now)
        .fetch_optional(pool)
        .await
}

pub async fn mark_done(conn: &mut SqliteConnection, job_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE grading_jobs SET status = ?, last_error = NULL, updated_at = ? WHERE id = ?",
    )
    .bind(STATUS_DONE)
    .bind(Utc::now())
    .bind(job_id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Closes any open job for an attempt whose score was recorded by hand.
///
/// A job that is already running is closed too; the worker then drops the
/// grader's result instead of overwriting the hand-entered score.
pub async fn close_for_attempt(
    conn: &mut SqliteConnection,
    test_id: i64,
    student_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE grading_jobs
        SET status = 'done', last_error = NULL, updated_at = ?
        WHERE test_id = ? AND student_id = ? AND status IN ('pending', 'running', 'failed')
        "#,
    )
    .bind(Utc::now())
    .bind(test_id)
    .bind(student_id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Records a failed attempt. The job goes back to 'pending' after a backoff
/// delay, or to 'failed' once `max_attempts` is reached. Returns the new status.
///
/// Only a job still 'running' is touched, so a job closed meanwhile stays closed.
pub async fn record_failure(
    pool: &SqlitePool,
    job: &GradingJob,
    error: &str,
    max_attempts: u32,
    retry_base_ms: u64,
) -> Result<&'static str, sqlx::Error> {
    let now = Utc::now();
    let (status, next_attempt_at) = if job.attempts >= i64::from(max_attempts) {
        (STATUS_FAILED, now)
    } else {
        (STATUS_PENDING, now + retry_delay(job.attempts, retry_base_ms))
    };

    sqlx::query(
        r#"
        UPDATE grading_jobs
        SET status = ?, last_error = ?, next_attempt_at = ?, updated_at = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(status)
    .bind(error)
    .bind(next_attempt_at)
    .bind(now)
    .bind(job.id)
    .bind(STATUS_RUNNING)
    .execute(pool)
    .await?;

    Ok(status)
}

/// Puts an attempt back in line with a fresh attempt budget. Returns false if no job exists.
pub async fn requeue(pool: &SqlitePool, test_id: i64, student_id: i64) -> Result<bool, sqlx::Error> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        UPDATE grading_jobs
        SET status = 'pending', attempts = 0, last_error = NULL, next_attempt_at = ?, updated_at = ?
        WHERE test_id = ? AND student_id = ? AND status != 'running'
        "#,
    )
    .bind(now)
    .bind(now)
    .bind(test_id)
    .bind(student_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Jobs left 'running' by a previous process can never finish; make them pending again.
pub async fn recover_stale(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE grading_jobs SET status = 'pending', updated_at = ? WHERE status = 'running'",
    )
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn find(
    pool: &SqlitePool,
    test_id: i64,
    student_id: i64,
) -> Result<Option<GradingJob>, sqlx::Error> {
    let sql = format!("SELECT {JOB_COLUMNS} FROM grading_jobs WHERE test_id = ? AND student_id = ?");
    sqlx::query_as::<_, GradingJob>(&sql)
        .bind(test_id)
        .bind(student_id)
        .fetch_optional(pool)
        .await
}

/// Exponential backoff: `base`, `2 * base`, `4 * base`, ... capped at ten minutes.
pub fn retry_delay(attempts: i64, base_ms: u64) -> Duration {
    let exponent = attempts.saturating_sub(1).clamp(0, 20) as u32;
    let base = i64::try_from(base_ms).unwrap_or(MAX_RETRY_DELAY_MS);
    let delay = base.saturating_mul(1_i64 << exponent).min(MAX_RETRY_DELAY_MS);
    Duration::milliseconds(delay)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(retry_delay(1, 5_000), Duration::seconds(5));
        assert_eq!(retry_delay(2, 5_000), Duration::seconds(10));
        assert_eq!(retry_delay(3, 5_000), Duration::seconds(20));
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(retry_delay(30, 5_000), Duration::minutes(10));
        assert_eq!(retry_delay(2, u64::MAX), Duration::minutes(10));
    }

    #[test]
    fn zero_attempts_uses_the_base_delay() {
        assert_eq!(retry_delay(0, 250), Duration::milliseconds(250));
    }
}
