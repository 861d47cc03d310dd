//! Upkeep adapter
//!
//! The protocol never advances liveness on its own. An external scheduler
//! calls in at its own cadence; this module is the contract it calls through.
//! Calls may come at any frequency with any gaps: `perform_upkeep` is a no-op
//! whenever `check_upkeep` is false.

use crate::heartbeat::{HeartbeatAction, HeartbeatStatus};
use crate::protocol::Protocol;
use lastsignal_core::{AccountId, Clock, Timestamp};
use serde::{Deserialize, Serialize};

/// Entry points a scheduler drives.
pub trait UpkeepTarget {
    /// Owners to visit this cycle
    fn upkeep_candidates(&self) -> Vec<AccountId>;
    /// Read-only: would `perform_upkeep` change anything?
    fn check_upkeep(&self, owner: &AccountId) -> bool;
    /// Apply the transition if needed; returns whether anything changed
    fn perform_upkeep(&mut self, owner: &AccountId) -> bool;
    /// Heartbeat of every owner, most urgent first
    fn heartbeats(&self) -> Vec<HeartbeatStatus>;
    fn now(&self) -> Timestamp;
}

impl<C: Clock> UpkeepTarget for Protocol<C> {
    fn upkeep_candidates(&self) -> Vec<AccountId> {
        self.owners()
    }

    fn check_upkeep(&self, owner: &AccountId) -> bool {
        Protocol::check_upkeep(self, owner)
    }

    fn perform_upkeep(&mut self, owner: &AccountId) -> bool {
        self.transition(owner)
    }

    fn heartbeats(&self) -> Vec<HeartbeatStatus> {
        Protocol::heartbeats(self)
    }

    fn now(&self) -> Timestamp {
        self.current_time()
    }
}

/// Outcome of one upkeep cycle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpkeepReport {
    pub at: Timestamp,
    /// Owners visited
    pub checked: usize,
    /// Owners moved to SuspectedDead this cycle
    pub transitioned: Vec<AccountId>,
    /// Heartbeats after the cycle, most urgent first
    pub heartbeats: Vec<HeartbeatStatus>,
}

impl UpkeepReport {
    /// Owners that should ping now
    pub fn needing_checkin(&self) -> impl Iterator<Item = &HeartbeatStatus> {
        self.heartbeats
            .iter()
            .filter(|h| h.action == HeartbeatAction::CheckinRequired)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UpkeepScheduler;

impl UpkeepScheduler {
    pub fn new() -> Self {
        Self
    }

    /// Visit every candidate once: check, then transition where needed.
    pub fn run_cycle<T: UpkeepTarget>(&self, target: &mut T) -> UpkeepReport {
        let candidates = target.upkeep_candidates();
        let mut transitioned = Vec::new();

        for owner in &candidates {
            if target.check_upkeep(owner) && target.perform_upkeep(owner) {
                transitioned.push(owner.clone());
            }
        }

        let heartbeats = target.heartbeats();
        log::debug!(
            "Upkeep cycle: {} owners checked, {} transitioned",
            candidates.len(),
            transitioned.len()
        );
        UpkeepReport {
            at: target.now(),
            checked: candidates.len(),
            transitioned,
            heartbeats,
        }
    }
}
