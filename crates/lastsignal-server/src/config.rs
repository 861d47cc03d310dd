//! Server configuration, parsed from a TOML file plus environment overrides.
//!
//! Priority: environment variables > config file > defaults.

use anyhow::{Context, Result};
use lastsignal_core::AccountId;
use lastsignal_inherit::{HeartbeatConfig, ProtocolConfig, VaultTemplate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// General server settings
    #[serde(default)]
    pub server: ServerSection,

    /// Protocol bootstrap parameters
    pub protocol: ProtocolSection,

    /// Heartbeat urgency thresholds
    #[serde(default)]
    pub heartbeat: HeartbeatSection,
}

/// General server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Data directory (protocol state file)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Upkeep interval in seconds (default: 1 hour)
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            check_interval_secs: default_check_interval(),
            log_level: default_log_level(),
        }
    }
}

/// Parameters used the first time the protocol state is created.
///
/// Once a state file exists these are only informational; the persisted
/// state wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolSection {
    /// Root admin principal
    pub admin: String,

    /// Principal the vault factory acts as
    #[serde(default = "default_factory")]
    pub factory: String,

    /// Distinct attester votes needed to finalize a death
    #[serde(default = "default_death_threshold")]
    pub death_threshold: usize,

    /// Independent signals needed to authorize a release (1 or 2)
    #[serde(default = "default_required_confirmations")]
    pub required_confirmations: usize,

    /// Asset label vaults hold
    #[serde(default = "default_asset")]
    pub asset: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatSection {
    #[serde(default = "default_checkin_threshold")]
    pub checkin_threshold: f64,

    #[serde(default = "default_critical_threshold")]
    pub critical_threshold: f64,
}

impl Default for HeartbeatSection {
    fn default() -> Self {
        Self {
            checkin_threshold: default_checkin_threshold(),
            critical_threshold: default_critical_threshold(),
        }
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_data_dir() -> PathBuf {
    PathBuf::from("/data")
}

fn default_check_interval() -> u64 {
    3600 // 1 hour
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_factory() -> String {
    "vault-factory".to_string()
}

fn default_death_threshold() -> usize {
    2
}

fn default_required_confirmations() -> usize {
    2
}

fn default_asset() -> String {
    "sat".to_string()
}

fn default_checkin_threshold() -> f64 {
    0.5
}

fn default_critical_threshold() -> f64 {
    0.9
}

// ============================================================================
// Loading & environment override
// ============================================================================

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: ServerConfig =
            toml::from_str(&contents).with_context(|| "Failed to parse TOML config")?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `LASTSIGNAL_DATA_DIR`
    /// - `LASTSIGNAL_CHECK_INTERVAL`
    /// - `LASTSIGNAL_LOG_LEVEL`
    /// - `LASTSIGNAL_ADMIN`
    /// - `LASTSIGNAL_DEATH_THRESHOLD`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LASTSIGNAL_DATA_DIR") {
            self.server.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("LASTSIGNAL_CHECK_INTERVAL") {
            if let Ok(secs) = v.parse::<u64>() {
                self.server.check_interval_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("LASTSIGNAL_LOG_LEVEL") {
            self.server.log_level = v;
        }
        if let Ok(v) = std::env::var("LASTSIGNAL_ADMIN") {
            self.protocol.admin = v;
        }
        if let Ok(v) = std::env::var("LASTSIGNAL_DEATH_THRESHOLD") {
            if let Ok(threshold) = v.parse::<usize>() {
                self.protocol.death_threshold = threshold;
            }
        }
    }

    /// Path of the persisted protocol state
    pub fn state_path(&self) -> PathBuf {
        self.server.data_dir.join("protocol_state.json")
    }

    /// Build the bootstrap configuration for a fresh protocol state.
    pub fn protocol_config(&self) -> Result<ProtocolConfig> {
        let admin = AccountId::new(&self.protocol.admin).context("Invalid protocol.admin")?;
        let factory = AccountId::new(&self.protocol.factory).context("Invalid protocol.factory")?;

        let mut config = ProtocolConfig::new(admin, factory);
        config.death_threshold = self.protocol.death_threshold;
        config.required_confirmations = self.protocol.required_confirmations;
        config.template = VaultTemplate {
            asset: self.protocol.asset.clone(),
            ..VaultTemplate::default()
        };
        config.heartbeat = HeartbeatConfig {
            checkin_threshold: self.heartbeat.checkin_threshold,
            critical_threshold: self.heartbeat.critical_threshold,
        };
        Ok(config)
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.protocol.admin.is_empty(),
            "protocol.admin must not be empty"
        );
        anyhow::ensure!(
            !self.protocol.factory.is_empty(),
            "protocol.factory must not be empty"
        );
        anyhow::ensure!(
            self.protocol.admin != self.protocol.factory,
            "protocol.factory must differ from protocol.admin"
        );

        anyhow::ensure!(
            self.protocol.death_threshold >= 1,
            "protocol.death_threshold must be >= 1"
        );
        anyhow::ensure!(
            (1..=2).contains(&self.protocol.required_confirmations),
            "protocol.required_confirmations must be 1 or 2"
        );
        anyhow::ensure!(
            !self.protocol.asset.is_empty(),
            "protocol.asset must not be empty"
        );

        anyhow::ensure!(
            self.server.check_interval_secs >= 1,
            "server.check_interval_secs must be >= 1"
        );

        let heartbeat = HeartbeatConfig {
            checkin_threshold: self.heartbeat.checkin_threshold,
            critical_threshold: self.heartbeat.critical_threshold,
        };
        heartbeat
            .validate()
            .context("Invalid [heartbeat] thresholds")?;

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
