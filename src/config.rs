//! Bridge configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

fn default_path() -> String {
    "/".into()
}

fn default_keep_alive_seconds() -> u64 {
    30
}

fn default_backlog() -> u32 {
    64
}

fn default_workspace() -> PathBuf {
    PathBuf::from(".")
}

fn default_discovery_dir() -> PathBuf {
    std::env::temp_dir().join("agent-bridge")
}

fn default_server_name() -> String {
    "agent-bridge".into()
}

/// Bridge configuration parsed from `config.toml`.
///
/// Every field has a default, so an empty document is a valid configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct BridgeConfig {
    /// TCP port on loopback; `0` asks the OS for an ephemeral port.
    #[serde(default)]
    pub port: u16,
    /// The single request target served by the bridge.
    #[serde(default = "default_path")]
    pub path: String,
    /// Idle period after which a stream receives a keep-alive frame.
    #[serde(default = "default_keep_alive_seconds")]
    pub keep_alive_seconds: u64,
    /// Pending-connection backlog passed to `listen`.
    #[serde(default = "default_backlog")]
    pub backlog: u32,
    /// Workspace root served by this editor instance.
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,
    /// Directory holding discovery lock files.
    #[serde(default = "default_discovery_dir")]
    pub discovery_dir: PathBuf,
    /// Name reported in the `initialize` handshake.
    #[serde(default = "default_server_name")]
    pub server_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: 0,
            path: default_path(),
            keep_alive_seconds: default_keep_alive_seconds(),
            backlog: default_backlog(),
            workspace: default_workspace(),
            discovery_dir: default_discovery_dir(),
            server_name: default_server_name(),
        }
    }
}

impl BridgeConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and normalize paths.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Keep-alive interval for stream connections.
    #[must_use]
    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs(self.keep_alive_seconds)
    }

    /// Check invariants and canonicalize the workspace root.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when a value is out of range or the
    /// workspace root does not exist.
    pub fn validate(&mut self) -> Result<()> {
        if !self.path.starts_with('/') {
            return Err(AppError::Config(format!(
                "path must start with '/', got '{}'",
                self.path
            )));
        }

        if self.keep_alive_seconds == 0 {
            return Err(AppError::Config(
                "keep_alive_seconds must be greater than zero".into(),
            ));
        }

        if self.backlog == 0 {
            return Err(AppError::Config("backlog must be greater than zero".into()));
        }

        self.workspace = self
            .workspace
            .canonicalize()
            .map_err(|err| AppError::Config(format!("workspace invalid: {err}")))?;

        Ok(())
    }
}
