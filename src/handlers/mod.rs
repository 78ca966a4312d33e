// src/handlers/mod.rs

pub mod auth;
pub mod leaderboard;
pub mod question;
pub mod score;
pub mod student;
pub mod submission;
