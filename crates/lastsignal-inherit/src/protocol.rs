//! Protocol facade
//!
//! [`Protocol`] owns the full [`ProtocolState`], reads time from a [`Clock`],
//! and exposes every externally callable operation. Each method checks
//! authorization and preconditions before it writes anything, so a failed
//! call leaves the state untouched, including the last observed time.
//! Successful state changes are journaled as [`ProtocolEvent`]s.

use crate::events::ProtocolEvent;
use crate::heartbeat::{self, HeartbeatConfig, HeartbeatStatus};
use crate::heir::HeirEntry;
use crate::ledger::{AssetLedger, Payout};
use crate::liveness::LivenessStatus;
use crate::release::ReleaseAuthorization;
use crate::state::ProtocolState;
use crate::vault::{compute_payouts, VaultTemplate};
use lastsignal_core::{
    AccountId, Capability, Clock, Duration, GrantRecord, ProtocolError, Timestamp,
};
use serde::{Deserialize, Serialize};

/// Construction parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Root admin installed at bootstrap
    pub admin: AccountId,
    /// Principal the vault factory acts as
    pub factory: AccountId,
    /// Distinct attester votes needed to finalize a death confirmation
    pub death_threshold: usize,
    /// Independent positive signals needed to authorize a release
    pub required_confirmations: usize,
    pub template: VaultTemplate,
    pub heartbeat: HeartbeatConfig,
}

impl ProtocolConfig {
    /// Defaults: threshold 2, both signals required.
    pub fn new(admin: AccountId, factory: AccountId) -> Self {
        Self {
            admin,
            factory,
            death_threshold: 2,
            required_confirmations: 2,
            template: VaultTemplate::default(),
            heartbeat: HeartbeatConfig::default(),
        }
    }
}

/// Snapshot of everything known about one owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerStatus {
    pub owner: AccountId,
    pub liveness: LivenessStatus,
    pub last_ping_time: Timestamp,
    pub confirmations: usize,
    pub threshold: usize,
    pub finalized: bool,
    pub heirs: usize,
    pub vault_balance: Option<u64>,
    pub released: bool,
    pub release_authorized: bool,
}

pub struct Protocol<C: Clock> {
    state: ProtocolState,
    clock: C,
    events: Vec<ProtocolEvent>,
}

impl<C: Clock> Protocol<C> {
    pub fn new(config: ProtocolConfig, clock: C) -> Result<Self, ProtocolError> {
        let state = ProtocolState::new(config, clock.now())?;
        Ok(Self::from_state(state, clock))
    }

    /// Resume from previously persisted state.
    pub fn from_state(state: ProtocolState, clock: C) -> Self {
        Self {
            state,
            clock,
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> &ProtocolState {
        &self.state
    }

    pub fn into_state(self) -> ProtocolState {
        self.state
    }

    /// Current time, never earlier than any time already observed.
    fn now(&self) -> Timestamp {
        self.clock.now().max(self.state.last_seen)
    }

    pub fn current_time(&self) -> Timestamp {
        self.now()
    }

    /// Remember `now` as observed. Called only once a state change has applied.
    fn commit(&mut self, now: Timestamp) {
        self.state.last_seen = now;
    }

    fn require_registered(&self, owner: &AccountId) -> Result<(), ProtocolError> {
        if self.state.monitor.is_registered(owner) {
            Ok(())
        } else {
            Err(ProtocolError::NotRegistered(owner.clone()))
        }
    }

    /// Heir lists freeze once death is finalized or the vault has paid out.
    fn require_heirs_mutable(&self, owner: &AccountId) -> Result<(), ProtocolError> {
        if self.state.quorum.is_finalized(owner) {
            return Err(ProtocolError::AlreadyFinalized(owner.clone()));
        }
        if self.state.factory.get(owner).is_some_and(|v| v.released) {
            return Err(ProtocolError::VaultReleased(owner.clone()));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Liveness
    // ------------------------------------------------------------------

    /// Register `owner`. Only the owner may register itself.
    pub fn register(
        &mut self,
        caller: &AccountId,
        owner: &AccountId,
        interval: Duration,
        timeout: Duration,
    ) -> Result<(), ProtocolError> {
        if caller != owner {
            return Err(ProtocolError::Unauthorized(format!(
                "{} cannot register on behalf of {}",
                caller, owner
            )));
        }
        let now = self.now();
        self.state.monitor.register(owner, interval, timeout, now)?;
        self.commit(now);
        self.events.push(ProtocolEvent::Registered {
            owner: owner.clone(),
            interval,
            timeout,
            at: now,
        });
        Ok(())
    }

    pub fn ping(&mut self, caller: &AccountId, owner: &AccountId) -> Result<(), ProtocolError> {
        let now = self.now();
        let finalized = self.state.quorum.is_finalized(owner);
        let resurrected = self.state.monitor.ping(caller, owner, now, finalized)?;
        self.commit(now);
        if resurrected {
            self.events.push(ProtocolEvent::Resurrected {
                owner: owner.clone(),
                at: now,
            });
        }
        self.events.push(ProtocolEvent::Pinged {
            owner: owner.clone(),
            at: now,
        });
        Ok(())
    }

    pub fn check_upkeep(&self, owner: &AccountId) -> bool {
        self.state.monitor.check_upkeep(owner, self.now())
    }

    /// Record a liveness lapse if one has occurred. Returns whether status changed.
    pub fn transition(&mut self, owner: &AccountId) -> bool {
        let now = self.now();
        let last_ping_time = self
            .state
            .monitor
            .get(owner)
            .map_or(0, |r| r.last_ping_time);
        let changed = self.state.monitor.transition(owner, now);
        if changed {
            self.commit(now);
            self.events.push(ProtocolEvent::SuspectedDead {
                owner: owner.clone(),
                last_ping_time,
                at: now,
            });
        }
        changed
    }

    // ------------------------------------------------------------------
    // Death quorum
    // ------------------------------------------------------------------

    pub fn add_attester(
        &mut self,
        caller: &AccountId,
        attester: &AccountId,
    ) -> Result<bool, ProtocolError> {
        let now = self.now();
        let added = self
            .state
            .quorum
            .add_attester(&self.state.access, caller, attester)?;
        self.commit(now);
        if added {
            self.events.push(ProtocolEvent::AttesterAdded {
                attester: attester.clone(),
                by: caller.clone(),
            });
        }
        Ok(added)
    }

    pub fn remove_attester(
        &mut self,
        caller: &AccountId,
        attester: &AccountId,
    ) -> Result<bool, ProtocolError> {
        let now = self.now();
        let removed = self
            .state
            .quorum
            .remove_attester(&self.state.access, caller, attester)?;
        self.commit(now);
        if removed {
            self.events.push(ProtocolEvent::AttesterRemoved {
                attester: attester.clone(),
                by: caller.clone(),
            });
        }
        Ok(removed)
    }

    /// Returns `true` when this vote finalized the death confirmation.
    pub fn submit_confirmation(
        &mut self,
        attester: &AccountId,
        owner: &AccountId,
    ) -> Result<bool, ProtocolError> {
        let now = self.now();
        self.require_registered(owner)?;
        let finalized = self.state.quorum.submit_confirmation(attester, owner, now)?;
        self.commit(now);
        self.events.push(ProtocolEvent::ConfirmationSubmitted {
            owner: owner.clone(),
            attester: attester.clone(),
            tally: self.state.quorum.tally(owner),
            at: now,
        });
        if finalized {
            self.events.push(ProtocolEvent::DeathFinalized {
                owner: owner.clone(),
                at: now,
            });
        }
        Ok(finalized)
    }

    // ------------------------------------------------------------------
    // Heirs
    // ------------------------------------------------------------------

    pub fn register_heir(
        &mut self,
        caller: &AccountId,
        owner: &AccountId,
        heir: &AccountId,
        share: u64,
    ) -> Result<(), ProtocolError> {
        let now = self.now();
        self.require_heirs_mutable(owner)?;
        self.state
            .heirs
            .register_heir(&self.state.access, caller, owner, heir, share, now)?;
        self.commit(now);
        self.events.push(ProtocolEvent::HeirRegistered {
            owner: owner.clone(),
            heir: heir.clone(),
            share,
            by: caller.clone(),
        });
        Ok(())
    }

    pub fn remove_heir(
        &mut self,
        caller: &AccountId,
        owner: &AccountId,
        heir: &AccountId,
    ) -> Result<HeirEntry, ProtocolError> {
        let now = self.now();
        self.require_heirs_mutable(owner)?;
        let removed = self
            .state
            .heirs
            .remove_heir(&self.state.access, caller, owner, heir)?;
        self.commit(now);
        self.events.push(ProtocolEvent::HeirRemoved {
            owner: owner.clone(),
            heir: heir.clone(),
            by: caller.clone(),
        });
        Ok(removed)
    }

    pub fn list_heirs(
        &self,
        caller: &AccountId,
        owner: &AccountId,
    ) -> Result<&[HeirEntry], ProtocolError> {
        self.state.heirs.list_heirs(&self.state.access, caller, owner)
    }

    // ------------------------------------------------------------------
    // Vaults
    // ------------------------------------------------------------------

    /// Instantiate `owner`'s vault. Anyone may call this.
    pub fn create_vault(&mut self, owner: &AccountId) -> Result<(), ProtocolError> {
        let now = self.now();
        self.state
            .factory
            .create_vault(&mut self.state.access, owner, now)?;
        self.commit(now);
        self.events.push(ProtocolEvent::VaultCreated {
            owner: owner.clone(),
            at: now,
        });
        Ok(())
    }

    /// Create the caller's vault and let the factory wire the initial heirs.
    ///
    /// Only the owner may choose its heirs this way. Either the vault and every
    /// heir are recorded, or nothing is.
    pub fn create_vault_with_heirs(
        &mut self,
        caller: &AccountId,
        owner: &AccountId,
        heirs: &[(AccountId, u64)],
    ) -> Result<(), ProtocolError> {
        if caller != owner {
            return Err(ProtocolError::Unauthorized(format!(
                "{} cannot choose heirs for {}",
                caller, owner
            )));
        }

        let checkpoint = self.state.clone();
        let journal_len = self.events.len();
        let result = self.create_vault(owner).and_then(|()| {
            let factory = self.state.factory.id().clone();
            heirs
                .iter()
                .try_for_each(|(heir, share)| self.register_heir(&factory, owner, heir, *share))
        });

        if result.is_err() {
            self.state = checkpoint;
            self.events.truncate(journal_len);
        }
        result
    }

    pub fn deposit(
        &mut self,
        caller: &AccountId,
        owner: &AccountId,
        amount: u64,
    ) -> Result<u64, ProtocolError> {
        let now = self.now();
        let balance = self.state.factory.deposit(caller, owner, amount)?;
        self.commit(now);
        self.events.push(ProtocolEvent::Deposited {
            owner: owner.clone(),
            amount,
            balance,
        });
        Ok(balance)
    }

    // ------------------------------------------------------------------
    // Release
    // ------------------------------------------------------------------

    pub fn evaluate(&self, owner: &AccountId) -> bool {
        self.state
            .controller
            .evaluate(&self.state.monitor, &self.state.quorum, owner)
    }

    pub fn authorize_release(
        &self,
        owner: &AccountId,
    ) -> Result<ReleaseAuthorization, ProtocolError> {
        self.state.controller.authorize_release(
            &self.state.monitor,
            &self.state.quorum,
            owner,
            self.now(),
        )
    }

    /// Pay out `owner`'s vault to its heirs. Permissionless once authorized.
    pub fn release(
        &mut self,
        owner: &AccountId,
        ledger: &mut dyn AssetLedger,
    ) -> Result<Vec<Payout>, ProtocolError> {
        let now = self.now();
        let vault = self
            .state
            .factory
            .get(owner)
            .ok_or_else(|| ProtocolError::NoVault(owner.clone()))?;
        if vault.released {
            return Err(ProtocolError::AlreadyReleased(owner.clone()));
        }
        let total = vault.balance;

        let authorization = self.authorize_release(owner)?;
        let payouts = self.state.factory.release(
            authorization,
            self.state.heirs.heirs_of(owner),
            ledger,
            now,
        )?;
        self.commit(now);
        self.events.push(ProtocolEvent::Released {
            owner: owner.clone(),
            total,
            heirs: payouts.len(),
            at: now,
        });
        Ok(payouts)
    }

    /// What [`release`](Self::release) would pay right now, without authorizing.
    pub fn preview_release(&self, owner: &AccountId) -> Result<Vec<Payout>, ProtocolError> {
        let vault = self
            .state
            .factory
            .get(owner)
            .ok_or_else(|| ProtocolError::NoVault(owner.clone()))?;
        Ok(compute_payouts(
            vault.balance,
            self.state.heirs.heirs_of(owner),
        ))
    }

    // ------------------------------------------------------------------
    // Capabilities
    // ------------------------------------------------------------------

    pub fn grant(
        &mut self,
        caller: &AccountId,
        principal: &AccountId,
        capability: Capability,
    ) -> Result<bool, ProtocolError> {
        let now = self.now();
        let granted = self
            .state
            .access
            .grant(caller, principal, capability.clone(), now)?;
        self.commit(now);
        if granted {
            self.events.push(ProtocolEvent::CapabilityGranted {
                principal: principal.clone(),
                capability,
                by: caller.clone(),
            });
        }
        Ok(granted)
    }

    pub fn revoke(
        &mut self,
        caller: &AccountId,
        principal: &AccountId,
        capability: Capability,
    ) -> Result<bool, ProtocolError> {
        let now = self.now();
        let revoked = self
            .state
            .access
            .revoke(caller, principal, &capability, now)?;
        self.commit(now);
        if revoked {
            self.events.push(ProtocolEvent::CapabilityRevoked {
                principal: principal.clone(),
                capability,
                by: caller.clone(),
            });
        }
        Ok(revoked)
    }

    pub fn audit_log(&self) -> &[GrantRecord] {
        self.state.access.audit_log()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn owners(&self) -> Vec<AccountId> {
        self.state.monitor.owners().cloned().collect()
    }

    pub fn status(&self, owner: &AccountId) -> Option<OwnerStatus> {
        let record = self.state.monitor.get(owner)?;
        let vault = self.state.factory.get(owner);
        Some(OwnerStatus {
            owner: owner.clone(),
            liveness: record.status,
            last_ping_time: record.last_ping_time,
            confirmations: self.state.quorum.tally(owner),
            threshold: self.state.quorum.threshold(),
            finalized: self.state.quorum.is_finalized(owner),
            heirs: self.state.heirs.len(owner),
            vault_balance: vault.map(|v| v.balance),
            released: vault.is_some_and(|v| v.released),
            release_authorized: self.evaluate(owner),
        })
    }

    pub fn heartbeat(&self, owner: &AccountId) -> Option<HeartbeatStatus> {
        let record = self.state.monitor.get(owner)?;
        Some(heartbeat::evaluate_heartbeat(
            owner,
            record,
            self.now(),
            &self.state.heartbeat,
        ))
    }

    /// Heartbeats of every owner, most urgent first.
    pub fn heartbeats(&self) -> Vec<HeartbeatStatus> {
        heartbeat::evaluate_batch(
            self.state.monitor.records(),
            self.now(),
            &self.state.heartbeat,
        )
    }

    pub fn events(&self) -> &[ProtocolEvent] {
        &self.events
    }

    /// Hand the journal to the caller, leaving it empty.
    pub fn drain_events(&mut self) -> Vec<ProtocolEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use crate::test_utils::{account, make_protocol};

    #[test]
    fn test_clock_never_goes_backwards() {
        let (mut protocol, clock) = make_protocol(1000);
        let alice = account("alice");
        protocol.register(&alice, &alice, 240, 240).unwrap();

        clock.set(1500);
        assert!(protocol.transition(&alice));

        // Clock regresses; readings are clamped to the latest observation
        clock.set(10);
        protocol.remove_attester(&account("root"), &account("att-a")).unwrap();
        assert_eq!(protocol.state().last_seen(), 1500);
    }

    #[test]
    fn test_register_requires_owner() {
        let (mut protocol, _clock) = make_protocol(0);
        let alice = account("alice");
        let eve = account("eve");

        assert!(matches!(
            protocol.register(&eve, &alice, 1, 1),
            Err(ProtocolError::Unauthorized(_))
        ));
        assert!(protocol.status(&alice).is_none());
        protocol.register(&alice, &alice, 240, 240).unwrap();
    }

    #[test]
    fn test_failed_calls_do_not_advance_time() {
        let (mut protocol, clock) = make_protocol(0);
        let alice = account("alice");
        protocol.register(&alice, &alice, 240, 240).unwrap();

        clock.set(100);
        assert!(protocol.ping(&account("eve"), &alice).is_err());
        assert!(protocol.deposit(&alice, &alice, 5).is_err());
        assert!(!protocol.transition(&alice));
        assert_eq!(protocol.state().last_seen(), 0);

        protocol.ping(&alice, &alice).unwrap();
        assert_eq!(protocol.state().last_seen(), 100);
    }

    #[test]
    fn test_ping_refused_after_finalization() {
        let (mut protocol, clock) = make_protocol(0);
        let alice = account("alice");
        protocol.register(&alice, &alice, 240, 240).unwrap();
        protocol.submit_confirmation(&account("att-a"), &alice).unwrap();
        protocol.submit_confirmation(&account("att-b"), &alice).unwrap();

        clock.set(100);
        assert_eq!(
            protocol.ping(&alice, &alice).unwrap_err(),
            ProtocolError::AlreadyFinalized(alice.clone())
        );
        assert_eq!(protocol.status(&alice).unwrap().last_ping_time, 0);
    }

    #[test]
    fn test_partial_votes_persist_across_ping() {
        let (mut protocol, clock) = make_protocol(0);
        let alice = account("alice");
        protocol.register(&alice, &alice, 240, 240).unwrap();

        clock.set(241);
        protocol.transition(&alice);
        protocol.submit_confirmation(&account("att-a"), &alice).unwrap();
        protocol.ping(&alice, &alice).unwrap();

        let status = protocol.status(&alice).unwrap();
        assert_eq!(status.liveness, LivenessStatus::Alive);
        assert_eq!(status.confirmations, 1);
        assert!(protocol
            .drain_events()
            .iter()
            .any(|e| matches!(e, ProtocolEvent::Resurrected { .. })));
    }

    #[test]
    fn test_confirmation_for_unknown_owner() {
        let (mut protocol, _clock) = make_protocol(0);
        assert_eq!(
            protocol
                .submit_confirmation(&account("att-a"), &account("ghost"))
                .unwrap_err(),
            ProtocolError::NotRegistered(account("ghost"))
        );
    }

    #[test]
    fn test_create_vault_with_heirs_is_atomic() {
        let (mut protocol, _clock) = make_protocol(0);
        let alice = account("alice");
        let heirs = vec![(account("h1"), 1), (account("h1"), 2)];

        let err = protocol
            .create_vault_with_heirs(&alice, &alice, &heirs)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::DuplicateHeir { .. }));
        assert!(!protocol.state().factory().contains(&alice));
        assert!(protocol.events().is_empty());

        let heirs = vec![(account("h1"), 1), (account("h2"), 2)];
        protocol
            .create_vault_with_heirs(&alice, &alice, &heirs)
            .unwrap();
        let listed = protocol.list_heirs(&alice, &alice).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].added_by, account("vault-factory"));
    }

    #[test]
    fn test_create_vault_with_heirs_owner_only() {
        let (mut protocol, _clock) = make_protocol(0);
        let err = protocol
            .create_vault_with_heirs(&account("eve"), &account("alice"), &[(account("eve"), 1)])
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Unauthorized(_)));
    }

    #[test]
    fn test_heirs_frozen_after_finalization() {
        let (mut protocol, _clock) = make_protocol(0);
        let alice = account("alice");
        protocol.register(&alice, &alice, 240, 240).unwrap();
        protocol.register_heir(&alice, &alice, &account("h1"), 1).unwrap();
        protocol.submit_confirmation(&account("att-a"), &alice).unwrap();
        protocol.submit_confirmation(&account("att-b"), &alice).unwrap();

        assert!(matches!(
            protocol.register_heir(&alice, &alice, &account("h2"), 1),
            Err(ProtocolError::AlreadyFinalized(_))
        ));
        assert!(matches!(
            protocol.remove_heir(&alice, &alice, &account("h1")),
            Err(ProtocolError::AlreadyFinalized(_))
        ));
    }

    #[test]
    fn test_release_checks_vault_before_authorization() {
        let (mut protocol, _clock) = make_protocol(0);
        let alice = account("alice");
        let mut ledger = InMemoryLedger::new();
        protocol.register(&alice, &alice, 240, 240).unwrap();

        assert!(matches!(
            protocol.release(&alice, &mut ledger),
            Err(ProtocolError::NoVault(_))
        ));
        protocol.create_vault(&alice).unwrap();
        assert!(matches!(
            protocol.release(&alice, &mut ledger),
            Err(ProtocolError::ThresholdNotMet(_))
        ));
    }

    #[test]
    fn test_grant_and_revoke_are_journaled() {
        let (mut protocol, _clock) = make_protocol(0);
        let root = account("root");
        let bob = account("bob");

        assert!(protocol.grant(&root, &bob, Capability::Admin).unwrap());
        assert!(protocol.add_attester(&bob, &account("att-z")).unwrap());
        assert!(protocol.revoke(&root, &bob, Capability::Admin).unwrap());
        assert!(protocol.add_attester(&bob, &account("att-y")).is_err());

        let events = protocol.drain_events();
        assert!(matches!(events[0], ProtocolEvent::CapabilityGranted { .. }));
        assert!(matches!(events[2], ProtocolEvent::CapabilityRevoked { .. }));
        assert!(protocol.events().is_empty());
        assert_eq!(protocol.audit_log().len(), 3);
    }

    #[test]
    fn test_preview_release() {
        let (mut protocol, _clock) = make_protocol(0);
        let alice = account("alice");
        protocol
            .create_vault_with_heirs(&alice, &alice, &[(account("h1"), 1), (account("h2"), 3)])
            .unwrap();
        protocol.deposit(&alice, &alice, 8).unwrap();

        let preview = protocol.preview_release(&alice).unwrap();
        assert_eq!(preview[0].amount, 2);
        assert_eq!(preview[1].amount, 6);
    }
}
