use std::path::PathBuf;

use clap::Parser;

use crate::config::ClientConfig;

#[derive(Debug, Parser)]
#[command(name = "cix")]
#[command(about = "Interactive client for the cix file server")]
#[command(version)]
pub struct Cli {
    #[arg(env = "CIX_SERVER_HOST", help = "Server host (overrides config)")]
    pub host: Option<String>,

    #[arg(env = "CIX_SERVER_PORT", help = "Server port (overrides config)")]
    pub port: Option<u16>,

    #[arg(long, help = "Config file path (default: ./cix.toml if present)")]
    pub config: Option<PathBuf>,

    #[arg(long, value_name = "SECS", help = "Give up on any network send or receive after this long")]
    pub timeout: Option<u64>,

    #[arg(long, value_name = "BYTES", help = "Largest payload to send or accept")]
    pub max_payload: Option<usize>,

    #[arg(long, value_name = "PATH", help = "Write the effective configuration to PATH and exit")]
    pub generate_config: Option<PathBuf>,
}

impl Cli {
    /// Command-line values take precedence over the config file
    pub fn apply(&self, config: &mut ClientConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(timeout) = self.timeout {
            config.io_timeout_secs = Some(timeout);
        }
        if let Some(max_payload) = self.max_payload {
            config.max_payload_bytes = max_payload;
        }
    }
}
