//! Events emitted by the protocol on every successful state change

use lastsignal_core::{AccountId, Capability, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProtocolEvent {
    Registered {
        owner: AccountId,
        interval: u64,
        timeout: u64,
        at: Timestamp,
    },

    Pinged {
        owner: AccountId,
        at: Timestamp,
    },

    /// A suspected-dead owner pinged before death was finalized
    Resurrected {
        owner: AccountId,
        at: Timestamp,
    },

    /// Liveness lapsed and was recorded by a transition
    SuspectedDead {
        owner: AccountId,
        last_ping_time: Timestamp,
        at: Timestamp,
    },

    AttesterAdded {
        attester: AccountId,
        by: AccountId,
    },

    AttesterRemoved {
        attester: AccountId,
        by: AccountId,
    },

    ConfirmationSubmitted {
        owner: AccountId,
        attester: AccountId,
        tally: usize,
        at: Timestamp,
    },

    DeathFinalized {
        owner: AccountId,
        at: Timestamp,
    },

    HeirRegistered {
        owner: AccountId,
        heir: AccountId,
        share: u64,
        by: AccountId,
    },

    HeirRemoved {
        owner: AccountId,
        heir: AccountId,
        by: AccountId,
    },

    VaultCreated {
        owner: AccountId,
        at: Timestamp,
    },

    Deposited {
        owner: AccountId,
        amount: u64,
        balance: u64,
    },

    Released {
        owner: AccountId,
        total: u64,
        heirs: usize,
        at: Timestamp,
    },

    CapabilityGranted {
        principal: AccountId,
        capability: Capability,
        by: AccountId,
    },

    CapabilityRevoked {
        principal: AccountId,
        capability: Capability,
        by: AccountId,
    },
}

impl ProtocolEvent {
    /// The owner this event concerns, if any
    pub fn owner(&self) -> Option<&AccountId> {
        match self {
            ProtocolEvent::Registered { owner, .. }
            | ProtocolEvent::Pinged { owner, .. }
            | ProtocolEvent::Resurrected { owner, .. }
            | ProtocolEvent::SuspectedDead { owner, .. }
            | ProtocolEvent::ConfirmationSubmitted { owner, .. }
            | ProtocolEvent::DeathFinalized { owner, .. }
            | ProtocolEvent::HeirRegistered { owner, .. }
            | ProtocolEvent::HeirRemoved { owner, .. }
            | ProtocolEvent::VaultCreated { owner, .. }
            | ProtocolEvent::Deposited { owner, .. }
            | ProtocolEvent::Released { owner, .. } => Some(owner),
            ProtocolEvent::AttesterAdded { .. }
            | ProtocolEvent::AttesterRemoved { .. }
            | ProtocolEvent::CapabilityGranted { .. }
            | ProtocolEvent::CapabilityRevoked { .. } => None,
        }
    }

    /// Events an operator should be alerted about
    pub fn is_alert(&self) -> bool {
        matches!(
            self,
            ProtocolEvent::SuspectedDead { .. }
                | ProtocolEvent::DeathFinalized { .. }
                | ProtocolEvent::Released { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::account;

    #[test]
    fn test_event_owner() {
        let event = ProtocolEvent::SuspectedDead {
            owner: account("alice"),
            last_ping_time: 0,
            at: 241,
        };
        assert_eq!(event.owner(), Some(&account("alice")));
        assert!(event.is_alert());
    }

    #[test]
    fn test_roster_events_have_no_owner() {
        let event = ProtocolEvent::AttesterAdded {
            attester: account("att"),
            by: account("root"),
        };
        assert!(event.owner().is_none());
        assert!(!event.is_alert());
    }
}
