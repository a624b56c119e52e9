use crate::config::types::{DecodePolicy, LaunchError, Result};
/// Launcher configuration loading from session-launch.json
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name searched for in the working directory by `load_default`
pub const DEFAULT_CONFIG_FILE: &str = "session-launch.json";

/// Environment override for the decode policy
pub const DECODE_POLICY_ENV: &str = "SESSION_LAUNCH_DECODE_POLICY";

/// Settings shared by the launching and receiving sides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct LauncherConfig {
    /// How received profiles are decoded
    pub decode_policy: DecodePolicy,
    /// Fail the launch when a resource limit cannot be applied
    pub strict_limits: bool,
    /// Permissions for files carrying the out-of-band ciphertext
    pub secret_file_mode: u32,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            decode_policy: DecodePolicy::BestEffort,
            strict_limits: false,
            secret_file_mode: 0o600,
        }
    }
}

impl LauncherConfig {
    /// Load configuration from a JSON file, then apply environment overrides
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_content = std::fs::read_to_string(path)
            .map_err(|e| LaunchError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config: LauncherConfig = serde_json::from_str(&config_content)
            .map_err(|e| LaunchError::Config(format!("Failed to parse config JSON: {}", e)))?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load `session-launch.json` from the working directory, falling back
    /// to defaults when it does not exist
    pub fn load_default() -> Result<Self> {
        let config_path = std::env::current_dir()
            .map_err(|e| LaunchError::Config(format!("Failed to get current directory: {}", e)))?
            .join(DEFAULT_CONFIG_FILE);

        if !config_path.exists() {
            log::debug!("{} not found, using defaults", DEFAULT_CONFIG_FILE);
            let mut config = Self::default();
            config.apply_env_overrides()?;
            return Ok(config);
        }

        Self::load_from_file(config_path)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var(DECODE_POLICY_ENV) {
            self.decode_policy = value.parse()?;
            log::debug!("Decode policy overridden from environment: {:?}", self.decode_policy);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.secret_file_mode & 0o077 != 0 {
            return Err(LaunchError::Config(format!(
                "secret_file_mode {:o} grants group/other access",
                self.secret_file_mode
            )));
        }
        Ok(())
    }
}
