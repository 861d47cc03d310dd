//! Persistent protocol state
//!
//! Everything the protocol knows, per owner and process-wide, in one
//! serializable value. The daemon keeps it in a JSON file between cycles.

use crate::heartbeat::HeartbeatConfig;
use crate::heir::HeirRegistry;
use crate::liveness::LifeSignalMonitor;
use crate::protocol::ProtocolConfig;
use crate::quorum::DeathConfirmationQuorum;
use crate::release::ReleaseController;
use crate::vault::VaultFactory;
use lastsignal_core::{AccessControl, ProtocolError, Timestamp};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Errors from state persistence
#[derive(Error, Debug)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid state: {0}")]
    Invalid(#[from] ProtocolError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolState {
    pub(crate) access: AccessControl,
    pub(crate) monitor: LifeSignalMonitor,
    pub(crate) quorum: DeathConfirmationQuorum,
    pub(crate) heirs: HeirRegistry,
    pub(crate) controller: ReleaseController,
    pub(crate) factory: VaultFactory,
    pub(crate) heartbeat: HeartbeatConfig,
    /// Latest time observed; readings never go below it
    pub(crate) last_seen: Timestamp,
}

impl ProtocolState {
    /// Fresh state bootstrapped from `config`.
    pub fn new(config: ProtocolConfig, now: Timestamp) -> Result<Self, ProtocolError> {
        config
            .heartbeat
            .validate()
            .map_err(|e| ProtocolError::InvalidParameter(e.to_string()))?;
        let quorum = DeathConfirmationQuorum::new(config.death_threshold)?;
        let controller = ReleaseController::new(config.required_confirmations)?;

        let mut access = AccessControl::new(config.admin.clone(), now);
        access.set_factory(&config.admin, config.factory.clone())?;

        Ok(Self {
            access,
            monitor: LifeSignalMonitor::new(),
            quorum,
            heirs: HeirRegistry::new(),
            controller,
            factory: VaultFactory::new(config.factory, config.template),
            heartbeat: config.heartbeat,
            last_seen: now,
        })
    }

    /// Load state from file, or `None` if the file does not exist yet.
    ///
    /// The loaded state is held to the same rules as a freshly built one.
    pub fn load(path: &Path) -> Result<Option<Self>, StateError> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)?;
        let state: Self = serde_json::from_str(&contents)?;
        state.validate()?;
        Ok(Some(state))
    }

    /// Re-check the parameters [`ProtocolState::new`] enforces.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        DeathConfirmationQuorum::new(self.quorum.threshold())?;
        ReleaseController::new(self.controller.required_confirmations())?;
        self.heartbeat
            .validate()
            .map_err(|e| ProtocolError::InvalidParameter(e.to_string()))?;
        if self.access.factory() != Some(self.factory.id()) {
            return Err(ProtocolError::InvalidParameter(format!(
                "vault factory {} is not the designated factory",
                self.factory.id()
            )));
        }
        Ok(())
    }

    /// Save state to file, writing a sibling temp file then renaming over it
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn monitor(&self) -> &LifeSignalMonitor {
        &self.monitor
    }

    pub fn quorum(&self) -> &DeathConfirmationQuorum {
        &self.quorum
    }

    pub fn factory(&self) -> &VaultFactory {
        &self.factory
    }

    pub fn controller(&self) -> &ReleaseController {
        &self.controller
    }

    pub fn last_seen(&self) -> Timestamp {
        self.last_seen
    }
}
