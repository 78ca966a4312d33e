// src/models/performance.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, types::Json};

/// One answer inside a performance entry. Entry `i` belongs to the test's question `i`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question_id: i64,
    pub question_text: String,
    pub submitted_answer: Option<String>,
    pub correct_answer: Option<String>,

    /// Verdict written by the grader ("Correct" / "Incorrect").
    pub graded_answer: Option<String>,
    pub score: Option<f64>,
}

/// Represents the 'performances' table: a student's attempt at one test.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    pub id: i64,
    pub student_id: i64,
    pub test_id: i64,
    pub test_name: String,
    pub submitted_at: DateTime<Utc>,
    pub submitted_answers: Json<Vec<SubmittedAnswer>>,

    /// Populated once the attempt has been graded.
    pub total_score: Option<f64>,
    pub total_possible_score: Option<f64>,
    pub graded_at: Option<DateTime<Utc>>,
}

impl Performance {
    pub fn is_graded(&self) -> bool {
        self.graded_at.is_some()
    }
}

/// Column list matching `Performance`, for `query_as`.
pub const PERFORMANCE_COLUMNS: &str = "id, student_id, test_id, test_name, submitted_at, \
     submitted_answers, total_score, total_possible_score, graded_at";

/// DTO for submitting a test attempt.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubmitTestRequest {
    /// Answers by question position. Non-string values are kept as their JSON text.
    pub answers: Vec<Value>,

    /// Optional; when present it must match the authenticated student.
    pub student_id: Option<i64>,
}

/// Row joined from `performances` and `students` for the leaderboard.
#[derive(Debug, Clone, FromRow)]
pub struct LeaderboardRow {
    pub student_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub performance_id: i64,
    pub test_name: String,
    pub total_score: Option<f64>,
    pub submitted_at: DateTime<Utc>,
}

/// Aggregated struct for displaying the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub student_id: i64,
    pub name: String,
    pub score: f64,
    pub test_name: String,
}
