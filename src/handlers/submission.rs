// src/handlers/submission.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::{Value, json};
use sqlx::{SqlitePool, types::Json as SqlJson};

use crate::{
    error::{AppError, is_unique_violation},
    grading::{GradingQueue, queue},
    handlers::{student::find_student, test::fetch_test},
    models::{
        performance::{SubmitTestRequest, SubmittedAnswer},
        question::{QUESTION_COLUMNS, Question},
        test::QuestionRef,
    },
    utils::jwt::Claims,
};

/// Question rows of a test keyed by id.
pub(crate) async fn question_map(
    pool: &SqlitePool,
    test_id: i64,
) -> Result<HashMap<i64, Question>, sqlx::Error> {
    let questions = sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE test_id = ?"
    ))
    .bind(test_id)
    .fetch_all(pool)
    .await?;

    Ok(questions.into_iter().map(|q| (q.id, q)).collect())
}

fn answer_text(answer: &Value) -> Option<String> {
    match answer {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Builds one entry per test question, by position.
///
/// Missing answers are recorded as `None`; answers past the last question are dropped.
pub fn build_submitted_answers(
    refs: &[QuestionRef],
    questions: &HashMap<i64, Question>,
    answers: &[Value],
) -> Vec<SubmittedAnswer> {
    refs.iter()
        .enumerate()
        .map(|(index, question_ref)| {
            let question = questions.get(&question_ref.question_id);
            SubmittedAnswer {
                question_id: question_ref.question_id,
                question_text: question
                    .map(|q| q.question_text.clone())
                    .unwrap_or_else(|| question_ref.question_text.clone()),
                submitted_answer: answers.get(index).and_then(answer_text),
                correct_answer: question.and_then(Question::expected_answer),
                graded_answer: None,
                score: None,
            }
        })
        .collect()
}

/// Records a student's attempt and queues it for grading.
///
/// The attempt and its grading job are written in one transaction; the
/// score arrives later through the grading worker.
pub async fn submit_test(
    State(pool): State<SqlitePool>,
    State(grading): State<GradingQueue>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<i64>,
    Json(payload): Json<SubmitTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;

    if payload.student_id.is_some_and(|id| id != student_id) {
        return Err(AppError::Forbidden(
            "You can only submit tests for yourself".to_string(),
        ));
    }

    let test = fetch_test(&pool, test_id).await?;
    find_student(&pool, student_id).await?;

    let questions = question_map(&pool, test_id).await?;
    let answers = build_submitted_answers(&test.questions.0, &questions, &payload.answers);

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO performances (student_id, test_id, test_name, submitted_at, submitted_answers)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(student_id)
    .bind(test_id)
    .bind(&test.test_name)
    .bind(Utc::now())
    .bind(SqlJson(&answers))
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Test already submitted".to_string())
        } else {
            tracing::error!("Failed to store submission: {:?}", e);
            AppError::from(e)
        }
    })?;

    queue::enqueue(&mut *tx, test_id, student_id).await?;

    tx.commit().await?;

    grading.wake();

    tracing::info!(
        "Student {} submitted test {} ({} answers for {} questions)",
        student_id,
        test_id,
        payload.answers.len(),
        answers.len()
    );

    Ok(Json(json!({
        "message": "Test submitted successfully",
        "gradingStatus": "pending"
    })))
}
