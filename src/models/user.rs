// src/models/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::performance::Performance;

pub const ROLE_STUDENT: &str = "student";
pub const ROLE_TEACHER: &str = "teacher";

/// Represents the 'accounts' table: login credentials for both user collections.
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub email: String,

    /// Argon2 password hash.
    pub password_hash: String,

    /// 'student' or 'teacher'; selects the table `user_id` points into.
    pub role: String,

    pub user_id: i64,
}

/// Represents the 'students' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub college: String,
    pub branch: String,
    pub semester: Option<String>,
    pub roll_no: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Represents the 'teachers' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub college: String,
    pub created_at: DateTime<Utc>,
}

/// A student together with the embedded performance entries.
#[derive(Debug, Serialize)]
pub struct StudentProfile {
    #[serde(flatten)]
    pub student: Student,
    pub performance: Vec<Performance>,
}

/// Response body of `GET /api/auth/user`, tagged with the user's role.
#[derive(Debug, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum UserProfile {
    Student(StudentProfile),
    Teacher(Teacher),
}

/// DTO for registration. Missing fields deserialize as empty and are caught by validation.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "First name is required."))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required."))]
    pub last_name: String,
    #[validate(email(message = "A valid email address is required."))]
    pub email: String,
    #[validate(length(
        min = 4,
        max = 128,
        message = "Password length must be between 4 and 128 characters."
    ))]
    pub password: String,
    pub confirm_password: String,
    #[validate(length(max = 200, message = "College name is too long."))]
    pub college: String,
    #[validate(length(max = 100))]
    pub branch: Option<String>,
    #[validate(length(max = 20))]
    pub semester: Option<String>,
    #[validate(length(max = 50))]
    pub roll_no: Option<String>,
    pub role: String,
}

/// DTO for user login.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 254))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Lower-cases and trims an email so lookups are case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
