// src/config.rs

use std::env;
use std::str::FromStr;

use dotenvy::dotenv;
use url::Url;

/// Default token lifetime: 5 hours.
pub const DEFAULT_JWT_EXPIRATION_SECS: u64 = 5 * 60 * 60;

/// Number of per-question scores carried by a score record (`q1`..`q5`).
pub const MAX_QUESTION_SCORES: usize = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub port: u16,

    /// Base URL of the external grading service. Always ends with '/'.
    pub grader_url: Url,
    pub grading_poll_interval_ms: u64,
    pub grading_max_attempts: u32,
    pub grading_retry_base_ms: u64,
    pub grading_timeout_secs: u64,

    pub seed_teacher_email: Option<String>,
    pub seed_teacher_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://autoassess.db".to_string());

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| "JWT_SECRET must be set".to_string())?;
        if jwt_secret.trim().is_empty() {
            return Err("JWT_SECRET must not be empty".to_string());
        }

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let grader_url = parse_base_url(
            &env::var("GRADER_URL").unwrap_or_else(|_| "http://127.0.0.1:5000".to_string()),
        )?;

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration: parse_var("JWT_EXPIRATION", DEFAULT_JWT_EXPIRATION_SECS)?,
            rust_log,
            port: parse_var("PORT", 3002)?,
            grader_url,
            grading_poll_interval_ms: parse_var("GRADING_POLL_INTERVAL_MS", 5_000)?,
            grading_max_attempts: parse_var("GRADING_MAX_ATTEMPTS", 5)?,
            grading_retry_base_ms: parse_var("GRADING_RETRY_BASE_MS", 5_000)?,
            grading_timeout_secs: parse_var("GRADING_TIMEOUT_SECS", 120)?,
            seed_teacher_email: env::var("SEED_TEACHER_EMAIL").ok(),
            seed_teacher_password: env::var("SEED_TEACHER_PASSWORD").ok(),
        })
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, String> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| format!("{} has an invalid value: '{}'", name, raw)),
        Err(_) => Ok(default),
    }
}

/// Parses a service base URL, appending a trailing slash so that
/// `Url::join` keeps the last path segment.
pub fn parse_base_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw).map_err(|e| format!("invalid GRADER_URL '{}': {}", raw, e))?;

    if url.cannot_be_a_base() {
        return Err(format!("GRADER_URL '{}' cannot be used as a base URL", raw));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}
