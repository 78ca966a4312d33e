// src/handlers/score.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use sqlx::{SqlitePool, types::Json as SqlJson};

use crate::{
    error::AppError,
    grading::queue,
    handlers::{
        graded_test::fetch_graded,
        student::{STUDENT_COLUMNS, find_student},
        submission::{build_submitted_answers, question_map},
        test::fetch_test,
    },
    models::{
        performance::{PERFORMANCE_COLUMNS, Performance, SubmittedAnswer},
        score::{AddScoresRequest, ScoreView},
        user::Student,
    },
    utils::{
        date::parse_datetime,
        jwt::{Claims, ensure_self_or_teacher},
    },
};

/// A fully checked score import row, ready to be written.
struct PreparedScore {
    student_id: i64,
    test_id: i64,
    test_name: String,
    answers: Vec<SubmittedAnswer>,
    total_score: f64,
    total_possible_score: f64,
    graded_at: chrono::DateTime<Utc>,
}

/// Imports scores by hand.
///
/// Every row is checked before anything is written; the writes then run in
/// one transaction. Existing attempts are updated, missing ones are created
/// with empty answers.
pub async fn add_scores(
    State(pool): State<SqlitePool>,
    Json(payload): Json<AddScoresRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.scores.is_empty() {
        return Err(AppError::BadRequest("No scores provided".to_string()));
    }

    let mut prepared = Vec::with_capacity(payload.scores.len());

    for item in &payload.scores {
        let total_score = item
            .total_score
            .filter(|s| s.is_finite())
            .ok_or_else(|| AppError::BadRequest("totalScore must be a number".to_string()))?;

        let graded_at = match item.date.as_deref() {
            Some(raw) => parse_datetime(raw)
                .ok_or_else(|| AppError::BadRequest(format!("Invalid date: {}", raw)))?,
            None => Utc::now(),
        };

        find_student(&pool, item.student_id).await?;
        let test = fetch_test(&pool, item.test_id).await?;

        let existing = sqlx::query_as::<_, Performance>(&format!(
            "SELECT {PERFORMANCE_COLUMNS} FROM performances WHERE student_id = ? AND test_id = ?"
        ))
        .bind(item.student_id)
        .bind(item.test_id)
        .fetch_optional(&pool)
        .await?;

        let mut answers = match existing {
            Some(performance) => performance.submitted_answers.0,
            None => {
                let questions = question_map(&pool, item.test_id).await?;
                build_submitted_answers(&test.questions.0, &questions, &[])
            }
        };

        if let Some(question_scores) = &item.question_scores {
            question_scores.apply(&mut answers);
        }

        prepared.push(PreparedScore {
            student_id: item.student_id,
            test_id: item.test_id,
            test_name: item.test_name.clone().unwrap_or(test.test_name),
            answers,
            total_score,
            total_possible_score: test.max_score,
            graded_at,
        });
    }

    let mut tx = pool.begin().await?;

    for score in &prepared {
        sqlx::query(
            r#"
            INSERT INTO performances (student_id, test_id, test_name, submitted_at, submitted_answers, total_score, total_possible_score, graded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (student_id, test_id) DO UPDATE SET
                test_name = excluded.test_name,
                submitted_answers = excluded.submitted_answers,
                total_score = excluded.total_score,
                total_possible_score = excluded.total_possible_score,
                graded_at = excluded.graded_at
            "#,
        )
        .bind(score.student_id)
        .bind(score.test_id)
        .bind(&score.test_name)
        .bind(score.graded_at)
        .bind(SqlJson(&score.answers))
        .bind(score.total_score)
        .bind(score.total_possible_score)
        .bind(score.graded_at)
        .execute(&mut *tx)
        .await?;

        queue::close_for_attempt(&mut *tx, score.test_id, score.student_id).await?;
    }

    tx.commit().await?;

    tracing::info!("Imported {} score(s)", prepared.len());

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Scores added successfully" })),
    ))
}

pub async fn scores_by_student(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(student_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_self_or_teacher(&claims, student_id)?;
    find_student(&pool, student_id).await?;

    let scores: Vec<ScoreView> = fetch_graded(&pool, student_id)
        .await?
        .iter()
        .filter_map(|p| ScoreView::from_performance(p, None))
        .collect();

    Ok(Json(scores))
}

/// Graded scores of one test, each carrying the student's name.
pub async fn scores_by_test(
    State(pool): State<SqlitePool>,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    fetch_test(&pool, test_id).await?;

    let performances = sqlx::query_as::<_, Performance>(&format!(
        "SELECT {PERFORMANCE_COLUMNS} FROM performances \
         WHERE test_id = ? AND graded_at IS NOT NULL \
         ORDER BY graded_at DESC, id DESC"
    ))
    .bind(test_id)
    .fetch_all(&pool)
    .await?;

    let names: HashMap<i64, String> = sqlx::query_as::<_, Student>(&format!(
        "SELECT {STUDENT_COLUMNS} FROM students \
         WHERE id IN (SELECT student_id FROM performances WHERE test_id = ?)"
    ))
    .bind(test_id)
    .fetch_all(&pool)
    .await?
    .into_iter()
    .map(|student| (student.id, student.full_name()))
    .collect();

    let scores: Vec<ScoreView> = performances
        .iter()
        .filter_map(|p| ScoreView::from_performance(p, names.get(&p.student_id).cloned()))
        .collect();

    Ok(Json(scores))
}
