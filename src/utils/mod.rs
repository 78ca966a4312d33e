// src/utils/mod.rs

pub mod date;
pub mod hash;
pub mod jwt;
