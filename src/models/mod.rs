// src/models/mod.rs

pub mod performance;
pub mod question;
pub mod score;
pub mod user;
