// src/handlers/leaderboard.rs

use std::collections::HashMap;

use axum::{Json, extract::State, response::IntoResponse};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::performance::{LeaderboardEntry, LeaderboardRow},
};

/// Ranks students by the score of their most recent performance entry.
///
/// * Latest entry by `submittedAt`, ties broken by the higher entry id.
/// * Ungraded entries count as 0.
/// * Order: score descending, then name ascending, then student id.
pub fn rank(rows: Vec<LeaderboardRow>) -> Vec<LeaderboardEntry> {
    let mut latest: HashMap<i64, LeaderboardRow> = HashMap::new();

    for row in rows {
        let newer = match latest.get(&row.student_id) {
            Some(current) => {
                (row.submitted_at, row.performance_id)
                    > (current.submitted_at, current.performance_id)
            }
            None => true,
        };
        if newer {
            latest.insert(row.student_id, row);
        }
    }

    let mut entries: Vec<LeaderboardEntry> = latest
        .into_values()
        .map(|row| LeaderboardEntry {
            student_id: row.student_id,
            name: format!("{} {}", row.first_name, row.last_name),
            score: row.total_score.unwrap_or(0.0),
            test_name: row.test_name,
        })
        .collect();

    entries.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.student_id.cmp(&b.student_id))
    });

    entries
}

/// Public leaderboard.
pub async fn get_leaderboard(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query_as::<_, LeaderboardRow>(
        r#"
        SELECT
            p.student_id,
            s.first_name,
            s.last_name,
            p.id AS performance_id,
            p.test_name,
            p.total_score,
            p.submitted_at
        FROM performances p
        JOIN students s ON s.id = p.student_id
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch leaderboard: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(rank(rows)))
}
