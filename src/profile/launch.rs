//! The launch profile: everything needed to start one user session.
//!
//! Wire shape (stable keys):
//!
//! ```text
//! { "context": {...}, "password": "", "encryptionKey": "<key>|<iv>",
//!   "executablePath": "...",
//!   "config": { "args": [...], "environment": {...}, "stdInput": "...",
//!               "stdStreamBehavior": 0, "priority": 0, "memoryLimitBytes": 0,
//!               ..., "cpuAffinity": [...] } }
//! ```
//!
//! Encoding is total. Decoding follows a [`DecodePolicy`]: best-effort logs
//! field errors and fills defaults, strict rejects the profile.

use crate::config::types::{DecodePolicy, FieldProblem, LaunchError, Result};
use crate::profile::context::SessionContext;
use crate::profile::limits::ResourceLimits;
use crate::profile::reader::{finish_errors, ObjectReader};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// What the launched process does with stdout/stderr
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum StdStreamBehavior {
    /// Share the launcher's streams
    #[default]
    Inherit = 0,
    /// Pipe streams back to the launcher
    Capture = 1,
    /// Discard output
    Null = 2,
}

impl StdStreamBehavior {
    pub fn as_wire(self) -> i32 {
        self as i32
    }

    pub fn from_wire(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Inherit),
            1 => Some(Self::Capture),
            2 => Some(Self::Null),
            _ => None,
        }
    }
}

/// Process invocation settings
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessConfig {
    pub args: Vec<String>,
    pub environment: BTreeMap<String, String>,
    /// Data written to the session's stdin
    pub std_input: String,
    pub std_stream_behavior: StdStreamBehavior,
    pub limits: ResourceLimits,
}

/// Complete description of a session to be started.
///
/// `password` holds plaintext only between construction and encryption on
/// the launching side, and after decryption on the receiving side. Never
/// transmit a profile whose `password` is non-empty.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionLaunchProfile {
    pub context: SessionContext,
    pub password: String,
    pub encryption_key: String,
    pub executable_path: String,
    pub config: ProcessConfig,
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        ""
    } else {
        "<redacted>"
    }
}

impl fmt::Debug for SessionLaunchProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionLaunchProfile")
            .field("context", &self.context)
            .field("password", &redact(&self.password))
            .field("encryption_key", &redact(&self.encryption_key))
            .field("executable_path", &self.executable_path)
            .field("config", &self.config)
            .finish()
    }
}

impl SessionLaunchProfile {
    /// Encode to the wire shape. Total: limit values that cannot be
    /// represented degrade to `0` rather than failing.
    pub fn to_json(&self) -> Value {
        let mut config = Map::new();
        config.insert("args".into(), json!(self.config.args));
        config.insert("environment".into(), json!(self.config.environment));
        config.insert("stdInput".into(), json!(self.config.std_input));
        config.insert(
            "stdStreamBehavior".into(),
            json!(self.config.std_stream_behavior.as_wire()),
        );
        self.config.limits.write_json(&mut config);

        json!({
            "context": self.context.to_json(),
            "password": self.password,
            "encryptionKey": self.encryption_key,
            "executablePath": self.executable_path,
            "config": Value::Object(config),
        })
    }

    /// Best-effort decode: field errors are logged and defaults substituted.
    pub fn from_json(value: &Value) -> Self {
        // Best-effort never yields an error.
        Self::from_json_with_policy(value, DecodePolicy::BestEffort).unwrap_or_default()
    }

    /// Decode under an explicit policy.
    pub fn from_json_with_policy(value: &Value, policy: DecodePolicy) -> Result<Self> {
        let (profile, errors) = Self::decode(value);
        finish_errors(errors, policy)?;
        Ok(profile)
    }

    /// Decode every field independently, collecting field errors.
    fn decode(value: &Value) -> (Self, Vec<LaunchError>) {
        let mut top = ObjectReader::new("profile", Some(value));
        let context_json = top.object("context");
        let password = top.string("password");
        let encryption_key = top.string("encryptionKey");
        let executable_path = top.string("executablePath");
        let config_json = top.object("config");
        let mut errors = top.into_errors();

        let mut context_reader = ObjectReader::new("context", context_json);
        let context = SessionContext::read_json(&mut context_reader);
        errors.extend(context_reader.into_errors());

        let mut config_reader = ObjectReader::new("config", config_json);
        let args = config_reader.string_array("args");
        let environment = config_reader.string_map("environment").into_iter().collect();
        let std_input = config_reader.string("stdInput");
        let behavior = config_reader.int("stdStreamBehavior");
        let std_stream_behavior = StdStreamBehavior::from_wire(behavior).unwrap_or_else(|| {
            config_reader.fail("stdStreamBehavior", FieldProblem::OutOfRange { value: behavior });
            StdStreamBehavior::default()
        });
        let limits = ResourceLimits::read_json(&mut config_reader);
        errors.extend(config_reader.into_errors());

        let profile = SessionLaunchProfile {
            context,
            password,
            encryption_key,
            executable_path,
            config: ProcessConfig {
                args,
                environment,
                std_input,
                std_stream_behavior,
                limits,
            },
        };
        (profile, errors)
    }

    /// Whether the password has been replaced by key material
    pub fn is_encrypted(&self) -> bool {
        self.password.is_empty() && !self.encryption_key.is_empty()
    }

    /// Refuse a profile that still carries a plaintext password.
    ///
    /// Every path that puts a profile on a transport calls this first.
    pub fn ensure_transmittable(&self) -> Result<()> {
        if self.password.is_empty() {
            Ok(())
        } else {
            Err(LaunchError::PlaintextPassword)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::context::SessionScope;

    fn sample_profile() -> SessionLaunchProfile {
        let mut profile = SessionLaunchProfile {
            context: SessionContext::new("alice", SessionScope::from_project_id("proj", "id1")),
            password: String::new(),
            encryption_key: "a2V5|aXY=".into(),
            executable_path: "/usr/lib/session/rsession".into(),
            ..Default::default()
        };
        profile.config.args = vec!["--flag".into(), "value with spaces".into()];
        profile.config.environment.insert("LANG".into(), "C.UTF-8".into());
        profile.config.std_input = "input".into();
        profile.config.std_stream_behavior = StdStreamBehavior::Capture;
        profile.config.limits.memory_limit_bytes = Some(2_000_000_000);
        profile.config.limits.cpu_affinity = vec![true, false, true];
        profile
    }

    #[test]
    fn test_wire_keys() {
        let value = sample_profile().to_json();
        for key in ["context", "password", "encryptionKey", "executablePath", "config"] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(value["config"]["stdStreamBehavior"], 1);
        assert_eq!(value["config"]["cpuAffinity"], json!([true, false, true]));
        assert_eq!(value["context"]["id"], "id1");
    }

    #[test]
    fn test_round_trip_strict() {
        let profile = sample_profile();
        let decoded =
            SessionLaunchProfile::from_json_with_policy(&profile.to_json(), DecodePolicy::Strict)
                .unwrap();
        assert_eq!(decoded, profile);
    }

    #[test]
    fn test_best_effort_fills_defaults() {
        let value = json!({"executablePath": "/bin/true", "config": {"args": ["x"]}});
        let profile = SessionLaunchProfile::from_json(&value);
        assert_eq!(profile.executable_path, "/bin/true");
        assert_eq!(profile.config.args, vec!["x"]);
        assert_eq!(profile.context, SessionContext::default());
        assert_eq!(profile.config.limits, ResourceLimits::default());
    }

    #[test]
    fn test_strict_rejects_partial_profile() {
        let value = json!({"executablePath": "/bin/true"});
        assert!(matches!(
            SessionLaunchProfile::from_json_with_policy(&value, DecodePolicy::Strict),
            Err(LaunchError::DecodeField(_))
        ));
    }

    #[test]
    fn test_mixed_affinity_falls_back_to_empty() {
        let mut value = sample_profile().to_json();
        value["config"]["cpuAffinity"] = json!([true, 1, false]);

        let profile = SessionLaunchProfile::from_json(&value);
        assert!(profile.config.limits.cpu_affinity.is_empty());
        assert_eq!(profile.config.args, sample_profile().config.args);

        assert!(matches!(
            SessionLaunchProfile::from_json_with_policy(&value, DecodePolicy::Strict),
            Err(LaunchError::ParamTypeMismatch { index: 1, .. })
        ));
    }

    #[test]
    fn test_unknown_stream_behavior() {
        let mut value = sample_profile().to_json();
        value["config"]["stdStreamBehavior"] = json!(42);
        let profile = SessionLaunchProfile::from_json(&value);
        assert_eq!(profile.config.std_stream_behavior, StdStreamBehavior::Inherit);
    }

    #[test]
    fn test_non_object_input_yields_default() {
        let profile = SessionLaunchProfile::from_json(&json!("garbage"));
        assert_eq!(profile, SessionLaunchProfile::default());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut profile = sample_profile();
        profile.password = "s3cr3t".into();
        let rendered = format!("{:?}", profile);
        assert!(!rendered.contains("s3cr3t"));
        assert!(!rendered.contains("a2V5"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_transmittable_requires_empty_password() {
        let mut profile = sample_profile();
        assert!(profile.ensure_transmittable().is_ok());
        assert!(profile.is_encrypted());
        profile.password = "plain".into();
        assert!(matches!(
            profile.ensure_transmittable(),
            Err(LaunchError::PlaintextPassword)
        ));
    }
}
