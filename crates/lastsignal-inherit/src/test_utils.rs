//! Shared test utilities for lastsignal-inherit tests.
//!
//! Provides account construction, liveness records, heir lists and a
//! protocol instance wired to a manual clock.

use lastsignal_core::{AccountId, ManualClock, Timestamp};

use crate::heir::HeirEntry;
use crate::liveness::{LifeSignalRecord, LivenessStatus};
use crate::protocol::{Protocol, ProtocolConfig};

pub fn account(name: &str) -> AccountId {
    AccountId::new(name).unwrap()
}

/// Alive record with a 100 second interval.
pub fn make_record(last_ping_time: Timestamp, timeout: u64) -> LifeSignalRecord {
    LifeSignalRecord {
        last_ping_time,
        interval: 100,
        timeout,
        status: LivenessStatus::Alive,
        registered_at: last_ping_time,
    }
}

pub fn heir_entries(heirs: &[(&str, u64)]) -> Vec<HeirEntry> {
    heirs
        .iter()
        .map(|(name, share)| HeirEntry {
            heir: account(name),
            share: *share,
            added_at: 0,
            added_by: account("owner"),
        })
        .collect()
}

/// Admin `root`, factory `vault-factory`, threshold 2, both signals required.
pub fn test_config() -> ProtocolConfig {
    ProtocolConfig::new(account("root"), account("vault-factory"))
}

/// Protocol from [`test_config`] with attesters `att-a`, `att-b`, `att-c`.
///
/// The returned clock handle controls the protocol's time.
pub fn make_protocol(start: Timestamp) -> (Protocol<ManualClock>, ManualClock) {
    let clock = ManualClock::new(start);
    let mut protocol = Protocol::new(test_config(), clock.clone()).unwrap();
    for name in ["att-a", "att-b", "att-c"] {
        protocol
            .add_attester(&account("root"), &account(name))
            .unwrap();
    }
    protocol.drain_events();
    (protocol, clock)
}
