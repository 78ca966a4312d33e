// src/grading/mod.rs

//! Durable grading: attempts are queued in `grading_jobs` together with the
//! submission, and a background worker sends them to the external grader.

pub mod client;
pub mod queue;
pub mod worker;

pub use client::GraderClient;
pub use queue::{GradingJob, GradingQueue};
pub use worker::{GradingWorker, spawn_worker};
