//! Release authorization
//!
//! A stateless gate: nothing is stored, every call re-reads both signal
//! sources. Two independent subsystems feed it:
//!
//! 1. liveness lapse: the owner is `SuspectedDead`
//! 2. death quorum: the attesters' confirmation is finalized
//!
//! Both must be positive, and at least `required_confirmations` of them must
//! be observed, before a release may happen. Neither source alone can unlock
//! a vault.

use crate::liveness::{LifeSignalMonitor, LivenessStatus};
use crate::quorum::DeathConfirmationQuorum;
use lastsignal_core::{AccountId, ProtocolError, Timestamp};
use serde::{Deserialize, Serialize};

/// Number of independent signal sources the controller reads.
pub const INDEPENDENT_SIGNALS: usize = 2;

/// Single-use proof that a release was authorized.
///
/// Only [`ReleaseController::authorize_release`] can create one, and
/// [`crate::vault::VaultFactory::release`] consumes it by value.
#[derive(Debug)]
pub struct ReleaseAuthorization {
    owner: AccountId,
    issued_at: Timestamp,
    signals: usize,
}

impl ReleaseAuthorization {
    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    pub fn issued_at(&self) -> Timestamp {
        self.issued_at
    }

    pub fn signals(&self) -> usize {
        self.signals
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReleaseController {
    required_confirmations: usize,
}

impl ReleaseController {
    pub fn new(required_confirmations: usize) -> Result<Self, ProtocolError> {
        if required_confirmations == 0 || required_confirmations > INDEPENDENT_SIGNALS {
            return Err(ProtocolError::InvalidParameter(format!(
                "required_confirmations must be between 1 and {}",
                INDEPENDENT_SIGNALS
            )));
        }
        Ok(Self {
            required_confirmations,
        })
    }

    pub fn required_confirmations(&self) -> usize {
        self.required_confirmations
    }

    /// Count of positive independent signals for `owner`.
    pub fn signals(
        &self,
        monitor: &LifeSignalMonitor,
        quorum: &DeathConfirmationQuorum,
        owner: &AccountId,
    ) -> usize {
        let lapsed = monitor.status(owner) == Some(LivenessStatus::SuspectedDead);
        let confirmed = quorum.is_finalized(owner);
        usize::from(lapsed) + usize::from(confirmed)
    }

    pub fn evaluate(
        &self,
        monitor: &LifeSignalMonitor,
        quorum: &DeathConfirmationQuorum,
        owner: &AccountId,
    ) -> bool {
        let lapsed = monitor.status(owner) == Some(LivenessStatus::SuspectedDead);
        let confirmed = quorum.is_finalized(owner);
        lapsed && confirmed && self.signals(monitor, quorum, owner) >= self.required_confirmations
    }

    /// Issue a single-use authorization, or `ThresholdNotMet`.
    pub fn authorize_release(
        &self,
        monitor: &LifeSignalMonitor,
        quorum: &DeathConfirmationQuorum,
        owner: &AccountId,
        now: Timestamp,
    ) -> Result<ReleaseAuthorization, ProtocolError> {
        if !monitor.is_registered(owner) {
            return Err(ProtocolError::NotRegistered(owner.clone()));
        }
        if !self.evaluate(monitor, quorum, owner) {
            log::debug!(
                "Release of {} refused: {}/{} signals",
                owner,
                self.signals(monitor, quorum, owner),
                self.required_confirmations
            );
            return Err(ProtocolError::ThresholdNotMet(owner.clone()));
        }
        Ok(ReleaseAuthorization {
            owner: owner.clone(),
            issued_at: now,
            signals: self.signals(monitor, quorum, owner),
        })
    }
}

impl Default for ReleaseController {
    fn default() -> Self {
        Self {
            required_confirmations: INDEPENDENT_SIGNALS,
        }
    }
}
