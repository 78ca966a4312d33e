// src/grading/client.rs

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::{error::AppError, models::performance::SubmittedAnswer};

/// HTTP client for the external grading service.
#[derive(Clone)]
pub struct GraderClient {
    http: reqwest::Client,
    base_url: Url,
}

/// Everything the grader needs to grade one attempt without reading our database.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRequest<'a> {
    pub test_id: i64,
    pub student_id: i64,
    pub test_name: &'a str,
    pub schema: &'a Value,
    pub key_info: Option<&'a Value>,
    pub max_score: f64,
    pub submitted_answers: &'a [SubmittedAnswer],
}

/// Response of `POST /grade-test/:testId/:studentId`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeReport {
    pub total_score: f64,
    #[serde(default)]
    pub total_possible_score: Option<f64>,
    /// Per-question verdicts in question order; may be shorter than the attempt.
    #[serde(default)]
    pub graded_answers: Vec<GradedAnswer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GradedAnswer {
    #[serde(default, alias = "gradedAnswer")]
    pub result: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
}

impl GraderClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn grade(&self, request: &GradeRequest<'_>) -> Result<GradeReport, AppError> {
        let url = self
            .base_url
            .join(&format!(
                "grade-test/{}/{}",
                request.test_id, request.student_id
            ))
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

        let response = self.http.post(url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "grader responded with {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        Ok(response.json::<GradeReport>().await?)
    }
}

/// Writes the grader's verdicts onto the attempt, position by position.
/// Answers beyond the report keep their previous verdict.
pub fn apply_report(mut answers: Vec<SubmittedAnswer>, report: &GradeReport) -> Vec<SubmittedAnswer> {
    for (answer, graded) in answers.iter_mut().zip(&report.graded_answers) {
        if graded.result.is_some() {
            answer.graded_answer = graded.result.clone();
        }
        if graded.score.is_some() {
            answer.score = graded.score;
        }
    }
    answers
}
