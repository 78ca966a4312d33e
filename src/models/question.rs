// src/models/question.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,
    pub test_id: i64,

    /// 1-based position inside the test.
    pub question_number: i64,

    pub question_text: String,
    pub marks: f64,

    /// Reference answer written by the teacher.
    pub answer: Option<String>,

    /// Answer produced by the answer-generation service, used when grading.
    pub correct_answer: Option<String>,

    /// Choices for multiple-choice questions; empty for free-form SQL answers.
    pub options: Json<Vec<String>>,
}

/// Column list matching `Question`, for `query_as`.
pub const QUESTION_COLUMNS: &str =
    "id, test_id, question_number, question_text, marks, answer, correct_answer, options";

impl Question {
    /// The answer snapshotted into submissions: the generated answer if any, else the teacher's.
    pub fn expected_answer(&self) -> Option<String> {
        self.correct_answer.clone().or_else(|| self.answer.clone())
    }
}

/// DTO for adding a question to an existing test.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct AddQuestionRequest {
    pub test_id: i64,
    pub question_number: Option<i64>,
    #[validate(length(min = 1, max = 5000, message = "Question text must not be empty."))]
    pub question_text: String,
    pub marks: Value,
    #[validate(length(max = 5000))]
    pub answer: Option<String>,
    #[validate(length(max = 5000))]
    pub correct_answer: Option<String>,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
}

/// DTO for updating a question. Absent fields are left untouched.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateQuestionRequest {
    pub question_number: Option<i64>,
    #[validate(length(min = 1, max = 5000, message = "Question text must not be empty."))]
    pub question_text: Option<String>,
    pub marks: Option<Value>,
    #[validate(length(max = 5000))]
    pub answer: Option<String>,
    #[validate(length(max = 5000))]
    pub correct_answer: Option<String>,
    #[validate(custom(function = validate_options))]
    pub options: Option<Vec<String>>,
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() > 20 {
        return Err(validator::ValidationError::new("too_many_options"));
    }
    for opt in options {
        if opt.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}
