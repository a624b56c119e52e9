//! Execution control
//!
//! Turns a decoded launch profile into a running session process.

pub mod spawn;
