// src/handlers/student.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{
        performance::{PERFORMANCE_COLUMNS, Performance},
        user::Student,
    },
    utils::jwt::{Claims, ensure_self_or_teacher},
};

pub(crate) const STUDENT_COLUMNS: &str =
    "id, first_name, last_name, email, college, branch, semester, roll_no, created_at";

pub(crate) async fn find_student(pool: &SqlitePool, id: i64) -> Result<Student, AppError> {
    sqlx::query_as::<_, Student>(&format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Student not found".to_string()))
}

/// All performance entries of a student, oldest first.
pub(crate) async fn fetch_performances(
    pool: &SqlitePool,
    student_id: i64,
) -> Result<Vec<Performance>, sqlx::Error> {
    sqlx::query_as::<_, Performance>(&format!(
        "SELECT {PERFORMANCE_COLUMNS} FROM performances WHERE student_id = ? ORDER BY submitted_at, id"
    ))
    .bind(student_id)
    .fetch_all(pool)
    .await
}

pub async fn students_by_branch(
    State(pool): State<SqlitePool>,
    Path(branch): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let students = sqlx::query_as::<_, Student>(&format!(
        "SELECT {STUDENT_COLUMNS} FROM students WHERE branch = ? ORDER BY last_name, first_name, id"
    ))
    .bind(&branch)
    .fetch_all(&pool)
    .await?;

    Ok(Json(students))
}

pub async fn students_by_branch_and_semester(
    State(pool): State<SqlitePool>,
    Path((branch, semester)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let students = sqlx::query_as::<_, Student>(&format!(
        "SELECT {STUDENT_COLUMNS} FROM students WHERE branch = ? AND semester = ? \
         ORDER BY last_name, first_name, id"
    ))
    .bind(&branch)
    .bind(&semester)
    .fetch_all(&pool)
    .await?;

    Ok(Json(students))
}

/// Returns the raw performance array of a student.
///
/// Students may only read their own entries.
pub async fn student_performance(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(student_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_self_or_teacher(&claims, student_id)?;
    find_student(&pool, student_id).await?;

    let performance = fetch_performances(&pool, student_id).await?;

    Ok(Json(performance))
}
