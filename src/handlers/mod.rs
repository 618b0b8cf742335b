//! HTTP handlers

pub mod health;
pub mod samples;
pub mod datasets;
pub mod training;
