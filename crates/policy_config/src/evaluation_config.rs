//! Engine evaluation configuration.
//!
//! Feature toggles that used to be checked ad hoc during evaluation are hoisted
//! into [`EvaluationConfig`], which is handed to the engine when it is built.
//! The engine never consults any other source for these switches.

use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{ConfigurationError, ConfigurationResult};

#[cfg(test)]
#[path = "evaluation_config_tests.rs"]
mod tests;

/// Runtime configuration for approval reset and policy evaluation.
///
/// # Example TOML Configuration
///
/// ```toml
/// patch_id_aware = true
/// policy_bot_comments = false
/// merge_request_timeout_secs = 30
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Retain approvals whose recorded patch id matches the merge request's
    /// current patch id.
    #[serde(default = "default_true")]
    pub patch_id_aware: bool,

    /// Enqueue policy bot comments after license rules are evaluated.
    #[serde(default = "default_true")]
    pub policy_bot_comments: bool,

    /// Upper bound on the planning phase of a single merge request.
    /// `None` disables the timeout.
    #[serde(default)]
    pub merge_request_timeout_secs: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            patch_id_aware: true,
            policy_bot_comments: true,
            merge_request_timeout_secs: None,
        }
    }
}

impl EvaluationConfig {
    /// Parses configuration from TOML text and validates it.
    ///
    /// Missing keys fall back to their defaults, so an empty document yields
    /// [`EvaluationConfig::default`].
    ///
    /// # Errors
    ///
    /// - `ConfigurationError::ParseError` if the TOML is malformed
    /// - `ConfigurationError::InvalidConfiguration` if a value is out of range
    pub fn from_toml_str(content: &str) -> ConfigurationResult<Self> {
        let config: EvaluationConfig =
            toml::from_str(content).map_err(|e| ConfigurationError::ParseError {
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// - `ConfigurationError::FileNotFound` if the path does not exist
    /// - `ConfigurationError::FileAccessError` if the file cannot be read
    /// - any error returned by [`EvaluationConfig::from_toml_str`]
    pub fn load(path: &Path) -> ConfigurationResult<Self> {
        debug!("Loading evaluation configuration from {:?}", path);

        if !path.exists() {
            return Err(ConfigurationError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigurationError::FileAccessError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Self::from_toml_str(&content)
    }

    /// Checks that configured values are usable.
    pub fn validate(&self) -> ConfigurationResult<()> {
        if self.merge_request_timeout_secs == Some(0) {
            return Err(ConfigurationError::invalid(
                "merge_request_timeout_secs",
                "must be greater than zero when set",
            ));
        }
        Ok(())
    }

    /// The per merge request planning timeout, if any.
    pub fn merge_request_timeout(&self) -> Option<Duration> {
        self.merge_request_timeout_secs.map(Duration::from_secs)
    }
}
