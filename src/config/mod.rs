//! Configuration and shared types
//!
//! Error taxonomy, decode policy, and launcher settings.

pub mod launcher;
pub mod types;
