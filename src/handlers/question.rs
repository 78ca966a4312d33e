// src/handlers/question.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{SqliteConnection, SqlitePool, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    handlers::test::{parse_marks, totals},
    models::{
        question::{AddQuestionRequest, QUESTION_COLUMNS, Question, UpdateQuestionRequest},
        test::QuestionRef,
    },
};

/// Rebuilds a test's question references, `totalQuestions` and `maxScore`
/// from its question rows. Returns the new references.
pub(crate) async fn sync_test_questions(
    conn: &mut SqliteConnection,
    test_id: i64,
) -> Result<Vec<QuestionRef>, sqlx::Error> {
    let refs: Vec<QuestionRef> = sqlx::query_as::<_, (i64, String, f64)>(
        "SELECT id, question_text, marks FROM questions WHERE test_id = ? ORDER BY question_number, id",
    )
    .bind(test_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|(question_id, question_text, marks)| QuestionRef {
        question_id,
        question_text,
        marks,
    })
    .collect();

    let (total_questions, max_score) = totals(&refs);

    sqlx::query("UPDATE tests SET questions = ?, total_questions = ?, max_score = ? WHERE id = ?")
        .bind(SqlJson(&refs))
        .bind(total_questions)
        .bind(max_score)
        .bind(test_id)
        .execute(&mut *conn)
        .await?;

    Ok(refs)
}

async fn find_question(conn: &mut SqliteConnection, id: i64) -> Result<Question, AppError> {
    sqlx::query_as::<_, Question>(&format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Question not found".to_string()))
}

/// Adds a question to an existing test and updates the test's totals.
pub async fn add_question(
    State(pool): State<SqlitePool>,
    Json(payload): Json<AddQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let marks = parse_marks(&payload.marks, &payload.question_text)?;

    let mut tx = pool.begin().await?;

    let next_number = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COALESCE((SELECT MAX(question_number) FROM questions WHERE test_id = t.id), 0) + 1
        FROM tests t
        WHERE t.id = ?
        "#,
    )
    .bind(payload.test_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Test not found".to_string()))?;

    let question = sqlx::query_as::<_, Question>(&format!(
        r#"
        INSERT INTO questions (test_id, question_number, question_text, marks, answer, correct_answer, options)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING {QUESTION_COLUMNS}
        "#
    ))
    .bind(payload.test_id)
    .bind(payload.question_number.unwrap_or(next_number))
    .bind(&payload.question_text)
    .bind(marks)
    .bind(payload.answer.as_deref())
    .bind(payload.correct_answer.as_deref())
    .bind(SqlJson(&payload.options))
    .fetch_one(&mut *tx)
    .await?;

    sync_test_questions(&mut *tx, payload.test_id).await?;

    tx.commit().await?;

    tracing::info!("Question {} added to test {}", question.id, question.test_id);

    Ok((StatusCode::CREATED, Json(question)))
}

/// Lists the questions of a test in question order.
pub async fn get_questions(
    State(pool): State<SqlitePool>,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exists = sqlx::query_scalar::<_, i64>("SELECT 1 FROM tests WHERE id = ?")
        .bind(test_id)
        .fetch_optional(&pool)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("Test not found".to_string()));
    }

    let questions = sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE test_id = ? ORDER BY question_number, id"
    ))
    .bind(test_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(questions))
}

/// Partially updates a question. Absent fields keep their current value.
pub async fn update_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let mut tx = pool.begin().await?;

    let current = find_question(&mut *tx, id).await?;

    let question_text = payload.question_text.unwrap_or(current.question_text);
    let marks = match &payload.marks {
        Some(marks) => parse_marks(marks, &question_text)?,
        None => current.marks,
    };
    let options = payload.options.unwrap_or(current.options.0);

    let question = sqlx::query_as::<_, Question>(&format!(
        r#"
        UPDATE questions
        SET question_number = ?, question_text = ?, marks = ?, answer = ?, correct_answer = ?, options = ?
        WHERE id = ?
        RETURNING {QUESTION_COLUMNS}
        "#
    ))
    .bind(payload.question_number.unwrap_or(current.question_number))
    .bind(&question_text)
    .bind(marks)
    .bind(payload.answer.or(current.answer))
    .bind(payload.correct_answer.or(current.correct_answer))
    .bind(SqlJson(&options))
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    sync_test_questions(&mut *tx, question.test_id).await?;

    tx.commit().await?;

    Ok(Json(question))
}

/// Deletes a question and removes it from its test. Returns the deleted question.
pub async fn delete_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let question = find_question(&mut *tx, id).await?;

    sqlx::query("DELETE FROM questions WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sync_test_questions(&mut *tx, question.test_id).await?;

    tx.commit().await?;

    tracing::info!("Question {} removed from test {}", question.id, question.test_id);

    Ok(Json(question))
}
