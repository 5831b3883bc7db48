use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::protocol::{DEFAULT_HOST, DEFAULT_MAX_PAYLOAD, DEFAULT_PORT};

/// Config file picked up from the working directory when none is named
pub const DEFAULT_CONFIG_FILE: &str = "cix.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub max_payload_bytes: usize,
    /// Bound on every network send or receive; unset means wait forever
    pub io_timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD,
            io_timeout_secs: None,
        }
    }
}

impl ClientConfig {
    /// Load from `config_path`, or from `cix.toml` if it exists, or fall
    /// back to defaults. A named file that cannot be read is an error.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = match config_path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: ClientConfig = toml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        tracing::debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn save(&self, config_path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)
            .with_context(|| format!("writing config file {}", config_path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.host.is_empty(), "host must not be empty");
        ensure!(self.max_payload_bytes > 0, "max_payload_bytes must be positive");
        ensure!(
            self.max_payload_bytes <= u32::MAX as usize,
            "max_payload_bytes cannot exceed {}",
            u32::MAX
        );
        ensure!(self.io_timeout_secs != Some(0), "io_timeout_secs must be positive");
        Ok(())
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout_secs.map(Duration::from_secs)
    }

    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}
