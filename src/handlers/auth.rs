// src/handlers/auth.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    config::Config,
    error::{AppError, is_unique_violation},
    handlers::student::fetch_performances,
    models::user::{
        Account, LoginRequest, ROLE_STUDENT, ROLE_TEACHER, RegisterRequest, Student,
        StudentProfile, Teacher, UserProfile, normalize_email,
    },
    utils::{
        hash::{hash_password, verify_password},
        jwt::{Claims, sign_jwt},
    },
};

/// Registers a new student or teacher.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created with a session token.
pub async fn register(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (id, role) = create_user(&pool, &payload).await?;

    tracing::info!("Registered {} {}", role, id);

    let token = sign_jwt(id, role, &config.jwt_secret, config.jwt_expiration)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "token": token,
            "role": role,
            "id": id
        })),
    ))
}

/// Validates a registration and stores the profile plus its account row in one transaction.
/// Returns the new id and the role it belongs to.
pub async fn create_user(
    pool: &SqlitePool,
    payload: &RegisterRequest,
) -> Result<(i64, &'static str), AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if payload.password != payload.confirm_password {
        return Err(AppError::BadRequest("Passwords do not match".to_string()));
    }

    let role = match payload.role.as_str() {
        ROLE_STUDENT => ROLE_STUDENT,
        ROLE_TEACHER => ROLE_TEACHER,
        _ => {
            return Err(AppError::BadRequest(
                "Role must be 'student' or 'teacher'".to_string(),
            ));
        }
    };

    let branch = payload
        .branch
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty());
    if role == ROLE_STUDENT && branch.is_none() {
        return Err(AppError::BadRequest("Branch is required for students".to_string()));
    }

    let email = normalize_email(&payload.email);

    // Checked up front so that duplicates skip the password hashing.
    let exists = sqlx::query_scalar::<_, i64>("SELECT 1 FROM accounts WHERE email = ?")
        .bind(&email)
        .fetch_optional(pool)
        .await?;
    if exists.is_some() {
        return Err(AppError::Conflict("User already exists".to_string()));
    }

    let hashed_password = hash_password(&payload.password)?;
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    let inserted = if role == ROLE_STUDENT {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO students (first_name, last_name, email, college, branch, semester, roll_no, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(payload.first_name.trim())
        .bind(payload.last_name.trim())
        .bind(&email)
        .bind(payload.college.trim())
        .bind(branch)
        .bind(payload.semester.as_deref())
        .bind(payload.roll_no.as_deref())
        .bind(now)
        .fetch_one(&mut *tx)
        .await
    } else {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO teachers (first_name, last_name, email, college, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(payload.first_name.trim())
        .bind(payload.last_name.trim())
        .bind(&email)
        .bind(payload.college.trim())
        .bind(now)
        .fetch_one(&mut *tx)
        .await
    };

    let id = inserted.map_err(|e| duplicate_or_internal(e, &email))?;

    sqlx::query("INSERT INTO accounts (email, password_hash, role, user_id) VALUES (?, ?, ?, ?)")
        .bind(&email)
        .bind(&hashed_password)
        .bind(role)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| duplicate_or_internal(e, &email))?;

    tx.commit().await?;

    Ok((id, role))
}

fn duplicate_or_internal(e: sqlx::Error, email: &str) -> AppError {
    if is_unique_violation(&e) {
        AppError::Conflict("User already exists".to_string())
    } else {
        tracing::error!("Failed to register {}: {:?}", email, e);
        AppError::from(e)
    }
}

/// Authenticates a student or teacher and returns a JWT token.
///
/// Unknown emails and wrong passwords get the same 400 response.
pub async fn login(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.validate().is_err() {
        return Err(AppError::BadRequest("Invalid credentials".to_string()));
    }

    let account = sqlx::query_as::<_, Account>(
        "SELECT email, password_hash, role, user_id FROM accounts WHERE email = ?",
    )
    .bind(normalize_email(&payload.email))
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?
    .ok_or(AppError::BadRequest("Invalid credentials".to_string()))?;

    if !verify_password(&payload.password, &account.password_hash)? {
        return Err(AppError::BadRequest("Invalid credentials".to_string()));
    }

    let token = sign_jwt(
        account.user_id,
        &account.role,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "role": account.role,
        "id": account.user_id
    })))
}

/// Returns the user behind the bearer token.
///
/// Students come with their performance entries.
pub async fn get_user(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let profile = match claims.role.as_str() {
        ROLE_STUDENT => {
            let student = sqlx::query_as::<_, Student>(
                r#"
                SELECT id, first_name, last_name, email, college, branch, semester, roll_no, created_at
                FROM students
                WHERE id = ?
                "#,
            )
            .bind(user_id)
            .fetch_optional(&pool)
            .await?
            .ok_or(AppError::NotFound("User not found".to_string()))?;

            let performance = fetch_performances(&pool, student.id).await?;
            UserProfile::Student(StudentProfile {
                student,
                performance,
            })
        }
        ROLE_TEACHER => {
            let teacher = sqlx::query_as::<_, Teacher>(
                "SELECT id, first_name, last_name, email, college, created_at FROM teachers WHERE id = ?",
            )
            .bind(user_id)
            .fetch_optional(&pool)
            .await?
            .ok_or(AppError::NotFound("User not found".to_string()))?;

            UserProfile::Teacher(teacher)
        }
        _ => return Err(AppError::AuthError("Token is not valid".to_string())),
    };

    Ok(Json(json!({ "user": profile })))
}
