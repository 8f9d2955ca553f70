//! Configuration module for LNXSend.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, validation and defaults. The engine receives one
//! [`Config`] at construction; there is no process-wide singleton.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for the LNXSend engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub session: SessionConfig,
    pub endpoints: EndpointsConfig,
    pub storage: StorageConfig,
    pub device: DeviceConfig,
}

/// Session lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Base seconds between login retries; each sleep is jittered upward
    /// by up to 50%.
    pub reconnection_cooldown_secs: u64,
    /// Bound on the background logout RPC, in seconds.
    pub logout_timeout_secs: u64,
    /// Seconds between keep-alive pings on the push connection.
    pub heartbeat_period_secs: u64,
    /// Default deadline for a login retry loop; `None` retries forever.
    pub login_deadline_secs: Option<u64>,
}

/// Endpoint overrides, normally unset.
///
/// When set, the host/port replace the corresponding field of every push
/// endpoint the account service hands out. Used against staging
/// deployments and in tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointsConfig {
    pub notification_host: Option<String>,
    pub notification_port: Option<u16>,
}

/// Durable state locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for per-user snapshot state.
    pub home_dir: PathBuf,
}

/// How this device presents itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Name advertised to the account service and other devices.
    pub name: String,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/lnxsend/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("lnxsend")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

// Config derives Default because all its fields implement Default.

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnection_cooldown_secs: 10,
            logout_timeout_secs: 10,
            heartbeat_period_secs: 30,
            login_deadline_secs: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            home_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("lnxsend"),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "lnxsend".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"session.heartbeat_period_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- session ---
        if self.session.reconnection_cooldown_secs == 0 {
            errors.push(ValidationError {
                field: "session.reconnection_cooldown_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.session.logout_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "session.logout_timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.session.heartbeat_period_secs == 0 {
            errors.push(ValidationError {
                field: "session.heartbeat_period_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.session.login_deadline_secs == Some(0) {
            errors.push(ValidationError {
                field: "session.login_deadline_secs".into(),
                message: "must be greater than 0 when set".into(),
            });
        }

        // --- endpoints ---
        if self.endpoints.notification_port == Some(0) {
            errors.push(ValidationError {
                field: "endpoints.notification_port".into(),
                message: "must be greater than 0 when set".into(),
            });
        }
        if let Some(host) = &self.endpoints.notification_host {
            if host.is_empty() {
                errors.push(ValidationError {
                    field: "endpoints.notification_host".into(),
                    message: "must not be empty when set".into(),
                });
            }
        }

        // --- device ---
        if self.device.name.is_empty() {
            errors.push(ValidationError {
                field: "device.name".into(),
                message: "must not be empty".into(),
            });
        }

        errors
    }
}
