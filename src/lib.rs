//! session-launch: secure session launch profiles and fork-safety tracking
//!
//! A launch profile describes everything needed to start a user session
//! (identity, executable, arguments, environment, resource limits) and is
//! handed across a process or network boundary. The session password never
//! travels inside it: encryption swaps it for a single-use key and returns
//! the ciphertext for delivery over a separate channel.
//!
//! # Architecture
//!
//! ## Profile Model ([`profile`])
//! - [`profile::limits`]: resource limits and CPU affinity codec
//! - [`profile::context`]: session identity and scope codec
//! - [`profile::launch`]: the launch profile, its wire shape and decode policy
//! - [`profile::transport`]: profile and out-of-band secret channels
//!
//! ## Password Protocol ([`crypto`])
//! - [`crypto::password`]: encrypt/decrypt the profile password
//! - [`crypto`]: AES-256-GCM cipher and base64 framing
//!
//! ## Kernel Primitives ([`kernel`])
//! - [`kernel::fork`]: main-thread identity and post-fork detection
//! - `kernel::rlimits`: applying resource limits (Linux)
//!
//! ## Execution Control ([`exec`])
//! - [`exec::spawn`]: session process spawning and child tracking
//!
//! ## Configuration ([`config`])
//! - [`config::types`]: error taxonomy and decode policy
//! - [`config::launcher`]: launcher settings loading
//!
//! # Data Flow
//!
//! Launching side: build profile → [`encrypt_profile_password`] →
//! [`SessionLaunchProfile::to_json`] → transport. Receiving side:
//! [`SessionLaunchProfile::from_json`] → [`decrypt_profile_password`] with the
//! ciphertext from the side channel.

// Configuration & Errors
pub mod config;

// Profile Model
pub mod profile;

// Password Protocol
pub mod crypto;

// Kernel Primitives
pub mod kernel;

// Execution Control
pub mod exec;

// CLI entrypoint wiring for the session-launch binary.
pub mod cli;

// Re-export commonly used types for convenience
pub use config::types::{DecodePolicy, LaunchError, Result};
pub use crypto::password::{decrypt_profile_password, encrypt_profile_password};
pub use kernel::fork::{
    fork_hooks_installed, have_active_children, init_thread_id, is_main_thread,
    setup_fork_handlers, was_forked,
};
pub use profile::{
    ProcessConfig, ResourceLimits, SessionContext, SessionLaunchProfile, SessionScope,
    StdStreamBehavior,
};
