// src/grading/worker.rs

use std::time::Duration;

use chrono::Utc;
use sqlx::{SqlitePool, types::Json};
use tokio::task::JoinHandle;

use crate::{
    config::Config,
    error::AppError,
    grading::{
        client::{GradeRequest, GraderClient, apply_report},
        queue::{self, GradingJob, GradingQueue},
    },
    models::{
        performance::{PERFORMANCE_COLUMNS, Performance},
        test::{TEST_COLUMNS, Test},
    },
};

/// Background task that drains `grading_jobs` through the external grader.
pub struct GradingWorker {
    pool: SqlitePool,
    client: GraderClient,
    queue: GradingQueue,
    poll_interval: Duration,
    max_attempts: u32,
    retry_base_ms: u64,
}

impl GradingWorker {
    pub fn new(pool: SqlitePool, config: &Config, queue: GradingQueue) -> Result<Self, AppError> {
        let client = GraderClient::new(
            config.grader_url.clone(),
            Duration::from_secs(config.grading_timeout_secs),
        )?;

        Ok(Self {
            pool,
            client,
            queue,
            poll_interval: Duration::from_millis(config.grading_poll_interval_ms.max(10)),
            max_attempts: config.grading_max_attempts.max(1),
            retry_base_ms: config.grading_retry_base_ms,
        })
    }

    pub async fn run(self) {
        match queue::recover_stale(&self.pool).await {
            Ok(0) => {}
            Ok(n) => tracing::info!("Re-queued {} interrupted grading job(s)", n),
            Err(e) => tracing::error!("Failed to recover grading jobs: {:?}", e),
        }

        tracing::info!("Grading worker started (grader at {})", self.client.base_url());

        loop {
            match self.process_next().await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => tracing::error!("Grading queue error: {}", e),
            }

            // Sleep until woken by a submission or until the next poll.
            let _ = tokio::time::timeout(self.poll_interval, self.queue.notified()).await;
        }
    }

    /// Claims and processes one ready job. Returns `Ok(false)` when nothing was ready.
    pub async fn process_next(&self) -> Result<bool, AppError> {
        let Some(job) = queue::claim_next(&self.pool).await? else {
            return Ok(false);
        };

        match self.grade(&job).await {
            Ok(Some(total)) => tracing::info!(
                "Graded test {} for student {}: total score {}",
                job.test_id,
                job.student_id,
                total
            ),
            Ok(None) => tracing::info!(
                "Discarded grader result for test {} student {}: job closed while running",
                job.test_id,
                job.student_id
            ),
            Err(e) => {
                let status = queue::record_failure(
                    &self.pool,
                    &job,
                    &e.to_string(),
                    self.max_attempts,
                    self.retry_base_ms,
                )
                .await?;
                tracing::warn!(
                    "Grading test {} for student {} failed (attempt {}, now {}): {}",
                    job.test_id,
                    job.student_id,
                    job.attempts,
                    status,
                    e
                );
            }
        }

        Ok(true)
    }

    /// Grades one attempt. Returns `None` when the job was closed while the
    /// grader ran, in which case the stored result is left untouched.
    async fn grade(&self, job: &GradingJob) -> Result<Option<f64>, AppError> {
        let test = sqlx::query_as::<_, Test>(&format!(
            "SELECT {TEST_COLUMNS} FROM tests WHERE id = ?"
        ))
        .bind(job.test_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Test not found".to_string()))?;

        let performance = sqlx::query_as::<_, Performance>(&format!(
            "SELECT {PERFORMANCE_COLUMNS} FROM performances WHERE student_id = ? AND test_id = ?"
        ))
        .bind(job.student_id)
        .bind(job.test_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Test not submitted by the student".to_string()))?;

        let request = GradeRequest {
            test_id: test.id,
            student_id: job.student_id,
            test_name: &test.test_name,
            schema: &test.schema.0,
            key_info: test.key_info.as_ref().map(|k| &k.0),
            max_score: test.max_score,
            submitted_answers: &performance.submitted_answers.0,
        };

        let report = self.client.grade(&request).await?;

        let answers = apply_report(performance.submitted_answers.0, &report);
        let total_possible = report.total_possible_score.unwrap_or(test.max_score);

        let mut tx = self.pool.begin().await?;

        let written = sqlx::query(
            r#"
            UPDATE performances
            SET submitted_answers = ?, total_score = ?, total_possible_score = ?, graded_at = ?
            WHERE id = ?
              AND EXISTS (SELECT 1 FROM grading_jobs WHERE id = ? AND status = ?)
            "#,
        )
        .bind(Json(&answers))
        .bind(report.total_score)
        .bind(total_possible)
        .bind(Utc::now())
        .bind(performance.id)
        .bind(job.id)
        .bind(queue::STATUS_RUNNING)
        .execute(&mut *tx)
        .await?;

        if written.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        queue::mark_done(&mut *tx, job.id).await?;

        tx.commit().await?;

        Ok(Some(report.total_score))
    }
}

/// Starts the grading worker on the tokio runtime.
pub fn spawn_worker(
    pool: SqlitePool,
    config: &Config,
    queue: GradingQueue,
) -> Result<JoinHandle<()>, AppError> {
    let worker = GradingWorker::new(pool, config, queue)?;
    Ok(tokio::spawn(worker.run()))
}
