//! Configuration loading - JSON config file plus the DEVELOPMENT env flag

use crate::routing::ChannelRule;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

fn default_flush_interval_secs() -> u64 {
    15
}

/// Process configuration, loaded once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Shell command producing the event stream on stdout, e.g.
    /// `ssh -p 29418 review.example.com gerrit stream-events`.
    pub stream_command: String,
    /// Slack incoming-webhook URL.
    pub webhook_url: String,
    /// Seconds between flush cycles.
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    /// Channel name -> subscription rule.
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelRule>,
    /// Owner display name -> direct-message handle.
    #[serde(default)]
    pub users: BTreeMap<String, String>,
}

impl Config {
    /// Default config location: `~/.config/gerrit-notifier/config.json`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gerrit-notifier/config.json")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.stream_command.trim().is_empty() {
            anyhow::bail!("stream_command must not be empty");
        }
        if self.webhook_url.trim().is_empty() {
            anyhow::bail!("webhook_url must not be empty");
        }
        if self.flush_interval_secs == 0 {
            anyhow::bail!("flush_interval_secs must be at least 1");
        }
        Ok(())
    }
}

/// Dry-run flag, read once at startup and immutable for the process
/// lifetime: messages are classified, buffered, and logged, never delivered.
pub fn development_mode() -> bool {
    std::env::var_os("DEVELOPMENT").is_some()
}
