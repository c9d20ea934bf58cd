//! Clinic configuration
//!
//! Loaded once at startup and shared read-only afterwards. Every field has a
//! default so a partial JSON file only needs to name what it changes.

use crate::access_control::PermissionTable;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "CLINIC_CONFIG";

/// Configuration loading and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicConfig {
    pub gate: GateConfig,
    pub scheduling: SchedulingRules,
}

/// Access gate settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Path prefixes reachable without authentication
    pub public_prefixes: Vec<String>,
    /// Login entry point, target of authentication redirects
    pub login_url: String,
    /// Landing page, target of permission redirects
    pub dashboard_url: String,
    /// Replaces the standard permission tables when present
    pub permissions: Option<PermissionTable>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            public_prefixes: [
                "/login/",
                "/logout/",
                "/password_reset/",
                "/admin/login/",
                "/static/",
                "/media/",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            login_url: "/login/".to_string(),
            dashboard_url: "/dashboard/".to_string(),
            permissions: None,
        }
    }
}

/// Appointment duration bounds, in minutes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingRules {
    pub min_duration_minutes: u32,
    pub max_duration_minutes: u32,
    pub default_duration_minutes: u32,
}

impl Default for SchedulingRules {
    fn default() -> Self {
        Self {
            min_duration_minutes: 5,
            max_duration_minutes: 120,
            default_duration_minutes: 30,
        }
    }
}

impl SchedulingRules {
    pub fn accepts(&self, minutes: u32) -> bool {
        (self.min_duration_minutes..=self.max_duration_minutes).contains(&minutes)
    }
}

impl ClinicConfig {
    /// Load from the file named by `CLINIC_CONFIG`, or fall back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::from_path(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&raw)?;
        tracing::info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: ClinicConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let gate = &self.gate;

        for prefix in &gate.public_prefixes {
            check_prefix("public prefix", prefix)?;
        }
        check_prefix("login_url", &gate.login_url)?;
        check_prefix("dashboard_url", &gate.dashboard_url)?;

        // Login must stay reachable or nobody can ever authenticate
        if !gate
            .public_prefixes
            .iter()
            .any(|prefix| gate.login_url.starts_with(prefix.as_str()))
        {
            return Err(ConfigError::Invalid(format!(
                "login_url {} is not covered by any public prefix",
                gate.login_url
            )));
        }

        if let Some(table) = &gate.permissions {
            for (role, prefixes) in &table.path_prefixes {
                for prefix in prefixes {
                    check_prefix(&format!("{role} path prefix"), prefix)?;
                }
            }
        }

        let rules = &self.scheduling;
        if rules.min_duration_minutes == 0 {
            return Err(ConfigError::Invalid(
                "min_duration_minutes must be greater than 0".to_string(),
            ));
        }
        if rules.min_duration_minutes > rules.max_duration_minutes {
            return Err(ConfigError::Invalid(format!(
                "min_duration_minutes ({}) exceeds max_duration_minutes ({})",
                rules.min_duration_minutes, rules.max_duration_minutes
            )));
        }
        if !rules.accepts(rules.default_duration_minutes) {
            return Err(ConfigError::Invalid(format!(
                "default_duration_minutes ({}) is outside {}..={}",
                rules.default_duration_minutes,
                rules.min_duration_minutes,
                rules.max_duration_minutes
            )));
        }

        Ok(())
    }
}

fn check_prefix(what: &str, prefix: &str) -> Result<(), ConfigError> {
    if prefix.is_empty() {
        return Err(ConfigError::Invalid(format!("{what} cannot be empty")));
    }
    if !prefix.starts_with('/') {
        return Err(ConfigError::Invalid(format!(
            "{what} must start with '/': {prefix}"
        )));
    }
    Ok(())
}
