//! Owner liveness tracking.
//!
//! Each registered owner has a [`LifeSignalRecord`]. The owner refreshes it by
//! pinging. Status is cached: it only moves to `SuspectedDead` when someone
//! (normally the upkeep scheduler) calls [`LifeSignalMonitor::transition`]
//! after the timeout has been exceeded.

use lastsignal_core::{AccountId, Duration, ProtocolError, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LivenessStatus {
    Alive,
    SuspectedDead,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifeSignalRecord {
    /// Time of the most recent ping (registration counts as one)
    pub last_ping_time: Timestamp,
    /// Expected ping cadence
    pub interval: Duration,
    /// Grace period after the last ping before liveness lapses
    pub timeout: Duration,
    pub status: LivenessStatus,
    pub registered_at: Timestamp,
}

impl LifeSignalRecord {
    /// Seconds since the last ping (zero if the clock reads earlier).
    pub fn elapsed(&self, now: Timestamp) -> Duration {
        now.saturating_sub(self.last_ping_time)
    }

    /// Liveness has lapsed: strictly more than `timeout` since the last ping.
    pub fn is_lapsed(&self, now: Timestamp) -> bool {
        self.elapsed(now) > self.timeout
    }

    /// When the record will lapse if no ping arrives.
    pub fn deadline(&self) -> Timestamp {
        self.last_ping_time.saturating_add(self.timeout)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifeSignalMonitor {
    records: BTreeMap<AccountId, LifeSignalRecord>,
}

impl LifeSignalMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `owner` with the given cadence. The record starts `Alive`.
    pub fn register(
        &mut self,
        owner: &AccountId,
        interval: Duration,
        timeout: Duration,
        now: Timestamp,
    ) -> Result<(), ProtocolError> {
        if interval == 0 {
            return Err(ProtocolError::InvalidParameter("interval must be > 0".into()));
        }
        if timeout == 0 {
            return Err(ProtocolError::InvalidParameter("timeout must be > 0".into()));
        }
        if self.records.contains_key(owner) {
            return Err(ProtocolError::AlreadyRegistered(owner.clone()));
        }

        self.records.insert(
            owner.clone(),
            LifeSignalRecord {
                last_ping_time: now,
                interval,
                timeout,
                status: LivenessStatus::Alive,
                registered_at: now,
            },
        );
        log::info!(
            "Registered {} (interval {}s, timeout {}s)",
            owner,
            interval,
            timeout
        );
        Ok(())
    }

    /// Refresh liveness. Only the owner may ping.
    ///
    /// A `SuspectedDead` owner is resurrected unless death has been finalized,
    /// in which case liveness can no longer be renewed. Returns `true` when
    /// the call resurrected the owner.
    pub fn ping(
        &mut self,
        caller: &AccountId,
        owner: &AccountId,
        now: Timestamp,
        death_finalized: bool,
    ) -> Result<bool, ProtocolError> {
        if caller != owner {
            return Err(ProtocolError::Unauthorized(format!(
                "{} cannot ping on behalf of {}",
                caller, owner
            )));
        }
        if death_finalized {
            return Err(ProtocolError::AlreadyFinalized(owner.clone()));
        }
        let record = self
            .records
            .get_mut(owner)
            .ok_or_else(|| ProtocolError::NotRegistered(owner.clone()))?;

        record.last_ping_time = now;
        let resurrected = record.status == LivenessStatus::SuspectedDead;
        if resurrected {
            record.status = LivenessStatus::Alive;
            log::warn!("{} pinged while suspected dead; status reset to Alive", owner);
        }
        Ok(resurrected)
    }

    /// Whether [`transition`](Self::transition) would change anything.
    pub fn check_upkeep(&self, owner: &AccountId, now: Timestamp) -> bool {
        self.records
            .get(owner)
            .is_some_and(|r| r.status == LivenessStatus::Alive && r.is_lapsed(now))
    }

    /// Advance `owner` to `SuspectedDead` if its liveness has lapsed.
    ///
    /// Safe to call at any frequency: returns `false` and changes nothing when
    /// the condition does not hold (including unknown owners).
    pub fn transition(&mut self, owner: &AccountId, now: Timestamp) -> bool {
        if !self.check_upkeep(owner, now) {
            log::debug!("No liveness transition for {}", owner);
            return false;
        }
        if let Some(record) = self.records.get_mut(owner) {
            record.status = LivenessStatus::SuspectedDead;
            log::warn!(
                "{} missed its liveness deadline ({}s since last ping); suspected dead",
                owner,
                record.elapsed(now)
            );
        }
        true
    }

    pub fn get(&self, owner: &AccountId) -> Option<&LifeSignalRecord> {
        self.records.get(owner)
    }

    pub fn status(&self, owner: &AccountId) -> Option<LivenessStatus> {
        self.records.get(owner).map(|r| r.status)
    }

    pub fn is_registered(&self, owner: &AccountId) -> bool {
        self.records.contains_key(owner)
    }

    pub fn owners(&self) -> impl Iterator<Item = &AccountId> {
        self.records.keys()
    }

    pub fn records(&self) -> impl Iterator<Item = (&AccountId, &LifeSignalRecord)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::account;

    fn registered(interval: Duration, timeout: Duration, at: Timestamp) -> LifeSignalMonitor {
        let mut monitor = LifeSignalMonitor::new();
        monitor
            .register(&account("alice"), interval, timeout, at)
            .unwrap();
        monitor
    }

    #[test]
    fn test_register_rejects_zero_parameters() {
        let mut monitor = LifeSignalMonitor::new();
        let owner = account("alice");
        assert!(matches!(
            monitor.register(&owner, 0, 240, 0),
            Err(ProtocolError::InvalidParameter(_))
        ));
        assert!(matches!(
            monitor.register(&owner, 240, 0, 0),
            Err(ProtocolError::InvalidParameter(_))
        ));
        assert!(monitor.is_empty());
    }

    #[test]
    fn test_register_twice() {
        let mut monitor = registered(240, 240, 0);
        let err = monitor.register(&account("alice"), 60, 60, 5).unwrap_err();
        assert_eq!(err, ProtocolError::AlreadyRegistered(account("alice")));
        // Original cadence kept
        assert_eq!(monitor.get(&account("alice")).unwrap().interval, 240);
    }

    #[test]
    fn test_new_record_is_alive() {
        let monitor = registered(240, 240, 1000);
        let record = monitor.get(&account("alice")).unwrap();
        assert_eq!(record.status, LivenessStatus::Alive);
        assert_eq!(record.last_ping_time, 1000);
        assert_eq!(record.deadline(), 1240);
    }

    #[test]
    fn test_check_upkeep_boundary() {
        let monitor = registered(240, 240, 0);
        let owner = account("alice");

        assert!(!monitor.check_upkeep(&owner, 120));
        assert!(!monitor.check_upkeep(&owner, 240)); // exactly at timeout
        assert!(monitor.check_upkeep(&owner, 241));
    }

    #[test]
    fn test_check_upkeep_unknown_owner() {
        let monitor = registered(240, 240, 0);
        assert!(!monitor.check_upkeep(&account("nobody"), 10_000));
    }

    #[test]
    fn test_transition_is_idempotent() {
        let mut monitor = registered(240, 240, 0);
        let owner = account("alice");

        assert!(!monitor.transition(&owner, 120));
        assert_eq!(monitor.status(&owner), Some(LivenessStatus::Alive));

        assert!(monitor.transition(&owner, 241));
        assert!(!monitor.transition(&owner, 242));
        assert_eq!(monitor.status(&owner), Some(LivenessStatus::SuspectedDead));
        assert!(!monitor.check_upkeep(&owner, 1000));
    }

    #[test]
    fn test_ping_only_by_owner() {
        let mut monitor = registered(240, 240, 0);
        let err = monitor
            .ping(&account("mallory"), &account("alice"), 100, false)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Unauthorized(_)));
        assert_eq!(monitor.get(&account("alice")).unwrap().last_ping_time, 0);
    }

    #[test]
    fn test_ping_resets_deadline() {
        let mut monitor = registered(240, 240, 0);
        let owner = account("alice");

        assert!(!monitor.ping(&owner, &owner, 200, false).unwrap());
        // Would have lapsed at 241 without the ping
        assert!(!monitor.check_upkeep(&owner, 241));
        assert!(!monitor.check_upkeep(&owner, 440));
        assert!(monitor.check_upkeep(&owner, 441));
    }

    #[test]
    fn test_ping_resurrects() {
        let mut monitor = registered(240, 240, 0);
        let owner = account("alice");
        monitor.transition(&owner, 300);

        assert!(monitor.ping(&owner, &owner, 310, false).unwrap());
        assert_eq!(monitor.status(&owner), Some(LivenessStatus::Alive));
    }

    #[test]
    fn test_ping_after_finalization_fails() {
        let mut monitor = registered(240, 240, 0);
        let owner = account("alice");
        monitor.transition(&owner, 300);

        let err = monitor.ping(&owner, &owner, 310, true).unwrap_err();
        assert_eq!(err, ProtocolError::AlreadyFinalized(owner.clone()));
        assert_eq!(monitor.status(&owner), Some(LivenessStatus::SuspectedDead));
        assert_eq!(monitor.get(&owner).unwrap().last_ping_time, 0);
    }

    #[test]
    fn test_ping_unregistered() {
        let mut monitor = LifeSignalMonitor::new();
        let owner = account("alice");
        assert_eq!(
            monitor.ping(&owner, &owner, 1, false).unwrap_err(),
            ProtocolError::NotRegistered(owner.clone())
        );
    }
}
