/// Core types and errors for the session-launch system
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// What went wrong with a single field during a structured-value read
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldProblem {
    /// Key absent from the object (or the object itself absent)
    Missing,
    /// Key present with the wrong JSON type
    Mistyped { expected: &'static str },
    /// Integer-enum value outside the known set
    OutOfRange { value: i64 },
}

/// A missing or mistyped field encountered while decoding a profile
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("Failed to decode {scope}.{field}: {problem}")]
pub struct DecodeFieldError {
    /// Object the field belongs to (`profile`, `context`, `config`)
    pub scope: &'static str,
    pub field: &'static str,
    pub problem: FieldProblem,
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldProblem::Missing => write!(f, "field is missing"),
            FieldProblem::Mistyped { expected } => write!(f, "expected {}", expected),
            FieldProblem::OutOfRange { value } => write!(f, "value {} out of range", value),
        }
    }
}

/// Failures of the random source, the cipher, or its text framing.
///
/// Messages never include key material, ciphertext, or plaintext.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Secure random generation failed")]
    Random,

    #[error("Base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Cipher operation failed")]
    Cipher,

    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    KeyLength { expected: usize, actual: usize },

    #[error("Decrypted data is not valid UTF-8")]
    Utf8,
}

impl From<ring::error::Unspecified> for CryptoError {
    fn from(_: ring::error::Unspecified) -> Self {
        CryptoError::Cipher
    }
}

/// Custom error types for session-launch
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    DecodeField(#[from] DecodeFieldError),

    #[error("Parameter type mismatch: {field}[{index}] is not a boolean")]
    ParamTypeMismatch { field: &'static str, index: usize },

    #[error("Profile password encryption key invalid format")]
    InvalidKeyFormat,

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Profile still carries a plaintext password")]
    PlaintextPassword,

    #[error("Process error: {0}")]
    Process(String),

    #[error("Main thread identity already initialized")]
    AlreadyInitialized,
}

#[cfg(unix)]
impl From<nix::errno::Errno> for LaunchError {
    fn from(err: nix::errno::Errno) -> Self {
        LaunchError::Process(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LaunchError>;

/// How profile decoding reacts to field-level errors.
///
/// `BestEffort` logs each error, substitutes a default, and always yields a
/// profile. `Strict` returns the first error and yields nothing. A partially
/// decoded profile used to spawn a process is security relevant, so callers
/// that act on fields without validating them should pick `Strict`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecodePolicy {
    #[default]
    BestEffort,
    Strict,
}

impl std::str::FromStr for DecodePolicy {
    type Err = LaunchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best-effort" | "best_effort" | "besteffort" => Ok(DecodePolicy::BestEffort),
            "strict" => Ok(DecodePolicy::Strict),
            other => Err(LaunchError::Config(format!(
                "Unknown decode policy: {}",
                other
            ))),
        }
    }
}
