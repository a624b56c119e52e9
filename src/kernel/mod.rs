//! Thin wrappers around process-level kernel primitives.
//!
//! `unsafe` code is concentrated here.

pub mod fork;
#[cfg(target_os = "linux")]
pub mod rlimits;
