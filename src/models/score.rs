// src/models/score.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    config::MAX_QUESTION_SCORES,
    models::performance::{Performance, SubmittedAnswer},
};

/// Per-question scores of the first five questions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionScores {
    pub q1: Option<f64>,
    pub q2: Option<f64>,
    pub q3: Option<f64>,
    pub q4: Option<f64>,
    pub q5: Option<f64>,
}

impl QuestionScores {
    pub fn from_answers(answers: &[SubmittedAnswer]) -> Self {
        let mut scores = answers.iter().map(|a| a.score);
        let mut next = || scores.next().flatten();
        Self {
            q1: next(),
            q2: next(),
            q3: next(),
            q4: next(),
            q5: next(),
        }
    }

    pub fn to_array(&self) -> [Option<f64>; MAX_QUESTION_SCORES] {
        [self.q1, self.q2, self.q3, self.q4, self.q5]
    }

    /// Writes the given scores onto the first five answers. `None` leaves an answer untouched.
    pub fn apply(&self, answers: &mut [SubmittedAnswer]) {
        for (answer, score) in answers.iter_mut().zip(self.to_array()) {
            if score.is_some() {
                answer.score = score;
            }
        }
    }
}

/// Score record as served by `/api/scores`. Derived from a graded performance entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreView {
    pub student_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    pub test_id: i64,
    pub test_name: String,
    pub date: DateTime<Utc>,
    pub total_score: f64,
    pub total_possible_score: Option<f64>,
    pub question_scores: QuestionScores,
}

impl ScoreView {
    /// `None` for ungraded entries.
    pub fn from_performance(performance: &Performance, student_name: Option<String>) -> Option<Self> {
        let date = performance.graded_at?;
        Some(Self {
            student_id: performance.student_id,
            student_name,
            test_id: performance.test_id,
            test_name: performance.test_name.clone(),
            date,
            total_score: performance.total_score.unwrap_or(0.0),
            total_possible_score: performance.total_possible_score,
            question_scores: QuestionScores::from_answers(&performance.submitted_answers),
        })
    }
}

/// DTO for `POST /api/scores/addScores`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AddScoresRequest {
    pub scores: Vec<ScoreInput>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoreInput {
    pub student_id: i64,
    pub test_id: i64,
    pub test_name: Option<String>,
    pub date: Option<String>,
    pub total_score: Option<f64>,
    pub question_scores: Option<QuestionScores>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;

    fn answer(score: Option<f64>) -> SubmittedAnswer {
        SubmittedAnswer {
            score,
            ..Default::default()
        }
    }

    fn performance(graded: bool, answers: Vec<SubmittedAnswer>) -> Performance {
        Performance {
            id: 1,
            student_id: 10,
            test_id: 20,
            test_name: "Joins".to_string(),
            submitted_at: Utc::now(),
            submitted_answers: Json(answers),
            total_score: graded.then_some(4.0),
            total_possible_score: graded.then_some(6.0),
            graded_at: graded.then(Utc::now),
        }
    }

    #[test]
    fn question_scores_take_the_first_five_positions() {
        let answers: Vec<_> = (1..=7).map(|i| answer(Some(i as f64))).collect();
        let scores = QuestionScores::from_answers(&answers);

        assert_eq!(
            scores.to_array(),
            [Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)]
        );
    }

    #[test]
    fn short_or_ungraded_answer_lists_leave_gaps() {
        let scores = QuestionScores::from_answers(&[answer(Some(1.0)), answer(None)]);
        assert_eq!(scores.to_array(), [Some(1.0), None, None, None, None]);
    }

    #[test]
    fn imported_scores_fill_matching_positions() {
        let mut answers = vec![answer(Some(9.0)), answer(None), answer(None)];
        let scores = QuestionScores {
            q2: Some(2.0),
            q4: Some(4.0),
            ..Default::default()
        };

        scores.apply(&mut answers);

        assert_eq!(answers[0].score, Some(9.0));
        assert_eq!(answers[1].score, Some(2.0));
        assert_eq!(answers[2].score, None);
    }

    #[test]
    fn only_graded_entries_project_to_scores() {
        assert!(ScoreView::from_performance(&performance(false, vec![]), None).is_none());

        let view = ScoreView::from_performance(
            &performance(true, vec![answer(Some(1.0)), answer(Some(0.0))]),
            Some("Ada Lovelace".to_string()),
        )
        .unwrap();
        assert_eq!(view.total_score, 4.0);
        assert_eq!(view.test_name, "Joins");
        assert_eq!(view.question_scores.q2, Some(0.0));
        assert_eq!(view.student_name.as_deref(), Some("Ada Lovelace"));
    }
}
