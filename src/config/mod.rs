//! # Configuration Management Module
//!
//! TOML configuration for the `echoes` client, with defaults for every option and a
//! [`Config::validate`] pass that rejects impossible values before a session starts.
//!
//! ## Configuration Structure
//!
//! - [`AccountConfig`] - Connected account identity
//! - [`RemoteConfig`] - Where contract calls go (`local` simulator or HTTP `relay`)
//! - [`IndexerConfig`] - GraphQL indexer endpoint for chamber lookups
//! - [`StorageConfig`] - Persisted client store location
//! - [`ChamberConfig`] - Dimensions and seed range for newly created chambers
//! - [`TimingConfig`] - Death delay, status-line lifetime and tick rate
//! - [`PulseConfig`] - Pulse radii, cooldown and collapse delay
//! - [`RunConfig`] - Scoring
//! - [`LoggingConfig`] - Logging level and optional file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use echoes::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Config::create_default("echoes.toml").await?;
//!     let config = Config::load("echoes.toml").await?;
//!     config.validate()?;
//!     println!("Store: {}/{}", config.storage.data_dir, config.storage.store_name);
//!     Ok(())
//! }
//! ```

use crate::game::types::MAX_CHAMBER_DIM;
use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub account: AccountConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub indexer: IndexerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chamber: ChamberConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub pulse: PulseConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AccountConfig {
    /// Connected account address; unset means no controller is connected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RemoteMode {
    /// In-process simulator; nothing leaves the machine.
    #[default]
    Local,
    /// HTTP relay plus Torii indexer (requires the `net` feature).
    Relay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub mode: RemoteMode,
    pub relay_url: String,
    pub timeout_seconds: u64,
    /// Artificial latency for the local simulator, in milliseconds.
    #[serde(default)]
    pub local_latency_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            mode: RemoteMode::Local,
            relay_url: "http://localhost:5050/execute".to_string(),
            timeout_seconds: 30,
            local_latency_ms: 150,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    pub url: String,
    pub timeout_seconds: u64,
    /// GraphQL field that lists chamber models.
    pub model_query: String,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/graphql".to_string(),
            timeout_seconds: 10,
            model_query: "echoesOfTheVoidChamberModels".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    pub store_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            store_name: "echoes-of-the-void-store".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChamberConfig {
    pub width: u32,
    pub height: u32,
    /// Fresh seeds are drawn from `0..max_seed`.
    pub max_seed: u64,
}

impl Default for ChamberConfig {
    fn default() -> Self {
        Self {
            width: 16,
            height: 16,
            max_seed: 1_000_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    pub death_delay_ms: u64,
    /// How long a success line stays in the status bar.
    pub success_status_ms: u64,
    pub tick_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            death_delay_ms: 3000,
            success_status_ms: 2000,
            tick_ms: 100,
        }
    }
}

impl TimingConfig {
    pub fn death_delay(&self) -> Duration {
        Duration::from_millis(self.death_delay_ms)
    }

    pub fn success_status(&self) -> Duration {
        Duration::from_millis(self.success_status_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulseConfig {
    /// Radius sent with `emit_pulse`.
    pub remote_radius: u32,
    /// Radius revealed locally once the pulse is accepted.
    pub reveal_radius: u32,
    pub cooldown_ms: u64,
    /// Delay before the reveal collapses back to entrance and player.
    pub collapse_ms: u64,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            remote_radius: 5,
            reveal_radius: 2,
            cooldown_ms: 3000,
            collapse_ms: 3000,
        }
    }
}

impl PulseConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn collapse(&self) -> Duration {
        Duration::from_millis(self.collapse_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub points_per_chamber: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            points_per_chamber: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some("echoes.log".to_string()),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Reject values no session could run with.
    pub fn validate(&self) -> Result<()> {
        if self.chamber.width == 0 || self.chamber.height == 0 {
            bail!(
                "chamber dimensions must be non-zero (got {}x{})",
                self.chamber.width,
                self.chamber.height
            );
        }
        if self.chamber.width > MAX_CHAMBER_DIM || self.chamber.height > MAX_CHAMBER_DIM {
            bail!(
                "chamber dimensions must be at most {} (got {}x{})",
                MAX_CHAMBER_DIM,
                self.chamber.width,
                self.chamber.height
            );
        }
        if self.chamber.max_seed == 0 {
            bail!("chamber.max_seed must be at least 1");
        }
        if self.pulse.reveal_radius >= self.pulse.remote_radius {
            bail!(
                "pulse.reveal_radius ({}) must be smaller than pulse.remote_radius ({})",
                self.pulse.reveal_radius,
                self.pulse.remote_radius
            );
        }
        if self.timing.tick_ms == 0 {
            bail!("timing.tick_ms must be at least 1");
        }
        if self.storage.store_name.trim().is_empty() {
            bail!("storage.store_name must not be empty");
        }
        if let Some(identity) = &self.account.identity {
            crate::validation::validate_identity(identity)
                .map_err(|e| anyhow!("account.identity: {}", e))?;
        }
        if self.remote.mode == RemoteMode::Relay {
            if !cfg!(feature = "net") {
                bail!("remote.mode = \"relay\" requires the `net` feature");
            }
            if self.remote.timeout_seconds == 0 || self.indexer.timeout_seconds == 0 {
                bail!("relay and indexer timeouts must be at least 1 second");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.chamber.width, 16);
        assert_eq!(config.pulse.remote_radius, 5);
        assert_eq!(config.pulse.reveal_radius, 2);
        assert_eq!(config.timing.death_delay(), Duration::from_secs(3));
        assert_eq!(config.run.points_per_chamber, 100);
        assert_eq!(config.remote.mode, RemoteMode::Local);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [account]
            identity = "0x0123"

            [remote]
            mode = "relay"
            relay_url = "http://relay.test/execute"
            timeout_seconds = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.account.identity.as_deref(), Some("0x0123"));
        assert_eq!(config.remote.mode, RemoteMode::Relay);
        assert_eq!(config.remote.local_latency_ms, 0);
        assert_eq!(config.indexer.model_query, "echoesOfTheVoidChamberModels");
        assert_eq!(config.storage.store_name, "echoes-of-the-void-store");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.chamber.width = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.chamber.height = MAX_CHAMBER_DIM + 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.chamber.width = MAX_CHAMBER_DIM;
        config.chamber.height = MAX_CHAMBER_DIM;
        config.validate().unwrap();

        let mut config = Config::default();
        config.pulse.reveal_radius = 5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.account.identity = Some("alice".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_mode_fails_to_parse() {
        let parsed: Result<Config, _> = toml::from_str(
            r#"
            [remote]
            mode = "carrier-pigeon"
            relay_url = "x"
            timeout_seconds = 1
            "#,
        );
        assert!(parsed.is_err());
    }

    #[tokio::test]
    async fn test_create_default_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("echoes.toml");
        let path = path.to_str().unwrap();
        Config::create_default(path).await.unwrap();
        let loaded = Config::load(path).await.unwrap();
        loaded.validate().unwrap();
        assert_eq!(loaded.pulse.cooldown_ms, 3000);
    }
}
