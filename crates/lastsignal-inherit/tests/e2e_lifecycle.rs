//! End-to-end lifecycle test for LastSignal inheritance.
//!
//! Drives a full owner lifecycle through the public facade with a manual
//! clock:
//!
//! 1. Registration and liveness within the timeout
//! 2. Lapse detection and transition
//! 3. Death quorum finalization
//! 4. Release gating on both signals
//! 5. Weighted payout and single release
//! 6. Duplicate vault creation
//!
//! Run with: cargo test --test e2e_lifecycle

use lastsignal_core::{AccountId, ManualClock};
use lastsignal_inherit::{
    InMemoryLedger, LivenessStatus, Protocol, ProtocolConfig, ProtocolError, ProtocolEvent,
    ProtocolState, UpkeepScheduler,
};

fn account(name: &str) -> AccountId {
    AccountId::new(name).unwrap()
}

fn setup() -> (Protocol<ManualClock>, ManualClock) {
    let clock = ManualClock::new(0);
    let config = ProtocolConfig::new(account("root"), account("vault-factory"));
    let mut protocol = Protocol::new(config, clock.clone()).unwrap();
    protocol
        .add_attester(&account("root"), &account("att-a"))
        .unwrap();
    protocol
        .add_attester(&account("root"), &account("att-b"))
        .unwrap();
    (protocol, clock)
}

#[test]
fn test_full_inheritance_lifecycle() {
    let (mut protocol, clock) = setup();
    let owner = account("owner");
    let (h1, h2, h3) = (account("h1"), account("h2"), account("h3"));

    protocol.register(&owner, &owner, 240, 240).unwrap();
    let heirs = [(h1.clone(), 1), (h2.clone(), 1), (h3.clone(), 2)];
    protocol
        .create_vault_with_heirs(&owner, &owner, &heirs)
        .unwrap();
    protocol.deposit(&owner, &owner, 100).unwrap();

    // Within the timeout nothing happens
    clock.set(120);
    assert!(!protocol.check_upkeep(&owner));
    let report = UpkeepScheduler::new().run_cycle(&mut protocol);
    assert!(report.transitioned.is_empty());
    assert_eq!(
        protocol.status(&owner).unwrap().liveness,
        LivenessStatus::Alive
    );

    // Lapse
    clock.set(241);
    assert!(protocol.check_upkeep(&owner));
    let report = UpkeepScheduler::new().run_cycle(&mut protocol);
    assert_eq!(report.transitioned, vec![owner.clone()]);
    assert_eq!(
        protocol.status(&owner).unwrap().liveness,
        LivenessStatus::SuspectedDead
    );
    assert!(!protocol.evaluate(&owner));

    // Quorum
    clock.set(250);
    assert!(!protocol
        .submit_confirmation(&account("att-a"), &owner)
        .unwrap());
    let status = protocol.status(&owner).unwrap();
    assert_eq!(status.confirmations, 1);
    assert!(!status.finalized);

    clock.set(260);
    assert!(protocol
        .submit_confirmation(&account("att-b"), &owner)
        .unwrap());
    assert!(protocol.status(&owner).unwrap().finalized);
    assert!(protocol.evaluate(&owner));

    // Release
    let mut ledger = InMemoryLedger::new();
    let payouts = protocol.release(&owner, &mut ledger).unwrap();
    assert_eq!(payouts.iter().map(|p| p.amount).sum::<u64>(), 100);
    assert_eq!(ledger.balance_of(&h1), 25);
    assert_eq!(ledger.balance_of(&h2), 25);
    assert_eq!(ledger.balance_of(&h3), 50);

    let status = protocol.status(&owner).unwrap();
    assert!(status.released);
    assert_eq!(status.vault_balance, Some(0));

    assert_eq!(
        protocol.release(&owner, &mut ledger).unwrap_err(),
        ProtocolError::AlreadyReleased(owner.clone())
    );
    assert_eq!(ledger.history().len(), 3);

    let events = protocol.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, ProtocolEvent::DeathFinalized { at: 260, .. })));
    assert_eq!(events.iter().filter(|e| e.is_alert()).count(), 3);
}

#[test]
fn test_quorum_without_lapse_does_not_release() {
    let (mut protocol, clock) = setup();
    let owner = account("owner");
    protocol.register(&owner, &owner, 240, 240).unwrap();
    protocol.create_vault(&owner).unwrap();
    protocol.register_heir(&owner, &owner, &account("h1"), 1).unwrap();
    protocol.deposit(&owner, &owner, 10).unwrap();

    clock.set(100);
    protocol
        .submit_confirmation(&account("att-a"), &owner)
        .unwrap();
    protocol
        .submit_confirmation(&account("att-b"), &owner)
        .unwrap();
    assert!(protocol.status(&owner).unwrap().finalized);
    assert!(!protocol.evaluate(&owner));

    let mut ledger = InMemoryLedger::new();
    assert_eq!(
        protocol.release(&owner, &mut ledger).unwrap_err(),
        ProtocolError::ThresholdNotMet(owner.clone())
    );

    // The finalized owner cannot ping its way back; the lapse arrives on schedule
    assert_eq!(
        protocol.ping(&owner, &owner).unwrap_err(),
        ProtocolError::AlreadyFinalized(owner.clone())
    );
    clock.set(241);
    assert!(protocol.transition(&owner));
    assert!(protocol.evaluate(&owner));
    protocol.release(&owner, &mut ledger).unwrap();
    assert_eq!(ledger.balance_of(&account("h1")), 10);
}

#[test]
fn test_finalization_survives_roster_changes() {
    let (mut protocol, _clock) = setup();
    let owner = account("owner");
    let root = account("root");
    protocol.register(&owner, &owner, 240, 240).unwrap();
    protocol
        .submit_confirmation(&account("att-a"), &owner)
        .unwrap();
    protocol
        .submit_confirmation(&account("att-b"), &owner)
        .unwrap();

    protocol.remove_attester(&root, &account("att-a")).unwrap();
    protocol.remove_attester(&root, &account("att-b")).unwrap();
    assert!(protocol.status(&owner).unwrap().finalized);

    protocol.add_attester(&root, &account("att-c")).unwrap();
    assert_eq!(
        protocol
            .submit_confirmation(&account("att-c"), &owner)
            .unwrap_err(),
        ProtocolError::AlreadyFinalized(owner.clone())
    );
}

#[test]
fn test_failed_transfer_keeps_vault_releasable() {
    let (mut protocol, clock) = setup();
    let owner = account("owner");
    protocol.register(&owner, &owner, 240, 240).unwrap();
    protocol
        .create_vault_with_heirs(&owner, &owner, &[(account("h1"), 1), (account("h2"), 1)])
        .unwrap();
    protocol.deposit(&owner, &owner, 7).unwrap();

    clock.set(300);
    protocol.transition(&owner);
    protocol
        .submit_confirmation(&account("att-a"), &owner)
        .unwrap();
    protocol
        .submit_confirmation(&account("att-b"), &owner)
        .unwrap();

    let mut ledger = InMemoryLedger::new();
    ledger.reject(account("h2"));
    assert!(matches!(
        protocol.release(&owner, &mut ledger),
        Err(ProtocolError::TransferFailed(_))
    ));
    assert_eq!(ledger.balance_of(&account("h1")), 0);
    assert_eq!(protocol.status(&owner).unwrap().vault_balance, Some(7));

    ledger.accept(&account("h2"));
    protocol.release(&owner, &mut ledger).unwrap();
    assert_eq!(ledger.balance_of(&account("h1")), 4);
    assert_eq!(ledger.balance_of(&account("h2")), 3);
}

#[test]
fn test_duplicate_vault_rejected() {
    let (mut protocol, _clock) = setup();
    let owner = account("owner");
    protocol.create_vault(&owner).unwrap();
    protocol.deposit(&owner, &owner, 42).unwrap();

    assert_eq!(
        protocol.create_vault(&owner).unwrap_err(),
        ProtocolError::VaultAlreadyExists(owner.clone())
    );
    assert_eq!(protocol.state().factory().get(&owner).unwrap().balance, 42);
}

#[test]
fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("protocol_state.json");
    let owner = account("owner");

    let (mut protocol, clock) = setup();
    protocol.register(&owner, &owner, 240, 240).unwrap();
    clock.set(241);
    protocol.transition(&owner);
    protocol
        .submit_confirmation(&account("att-a"), &owner)
        .unwrap();
    protocol.into_state().save(&path).unwrap();

    let state = ProtocolState::load(&path).unwrap().unwrap();
    let mut resumed = Protocol::from_state(state, ManualClock::new(0));
    assert_eq!(resumed.current_time(), 241);
    assert_eq!(
        resumed
            .submit_confirmation(&account("att-a"), &owner)
            .unwrap_err(),
        ProtocolError::AlreadyConfirmed {
            attester: account("att-a"),
            owner: owner.clone(),
        }
    );
    assert!(resumed
        .submit_confirmation(&account("att-b"), &owner)
        .unwrap());
    assert!(resumed.evaluate(&owner));
}
