//! Death confirmation quorum
//!
//! Admins maintain a roster of attesters. Each attester may vote once per
//! owner; the vote that brings the tally to the threshold finalizes the
//! confirmation in the same call. Finalization is one-way: later roster
//! changes or votes never undo it.
//!
//! The threshold is a static target fixed at construction, not a fraction of
//! the current roster.

use lastsignal_core::{AccessControl, AccountId, ProtocolError, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A single attester vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub attester: AccountId,
    pub at: Timestamp,
}

/// Per-owner tally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathConfirmation {
    /// Votes in arrival order; at most one per attester
    confirmations: Vec<Confirmation>,
    finalized: bool,
    finalized_at: Option<Timestamp>,
}

impl DeathConfirmation {
    pub fn tally(&self) -> usize {
        self.confirmations.len()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn finalized_at(&self) -> Option<Timestamp> {
        self.finalized_at
    }

    pub fn has_confirmed(&self, attester: &AccountId) -> bool {
        self.confirmations.iter().any(|c| &c.attester == attester)
    }

    pub fn confirmed_by(&self) -> impl Iterator<Item = &AccountId> {
        self.confirmations.iter().map(|c| &c.attester)
    }

    pub fn confirmations(&self) -> &[Confirmation] {
        &self.confirmations
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeathConfirmationQuorum {
    threshold: usize,
    roster: BTreeSet<AccountId>,
    tallies: BTreeMap<AccountId, DeathConfirmation>,
}

impl DeathConfirmationQuorum {
    pub fn new(threshold: usize) -> Result<Self, ProtocolError> {
        if threshold == 0 {
            return Err(ProtocolError::InvalidParameter(
                "death confirmation threshold must be >= 1".into(),
            ));
        }
        Ok(Self {
            threshold,
            roster: BTreeSet::new(),
            tallies: BTreeMap::new(),
        })
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Add an attester to the roster. Admin-only. Returns `false` if already present.
    pub fn add_attester(
        &mut self,
        acl: &AccessControl,
        caller: &AccountId,
        attester: &AccountId,
    ) -> Result<bool, ProtocolError> {
        acl.require_admin(caller)?;
        let added = self.roster.insert(attester.clone());
        if added {
            log::info!("Attester {} added by {}", attester, caller);
        }
        Ok(added)
    }

    /// Remove an attester from the roster. Admin-only.
    ///
    /// Votes already cast by the attester stay in every tally.
    pub fn remove_attester(
        &mut self,
        acl: &AccessControl,
        caller: &AccountId,
        attester: &AccountId,
    ) -> Result<bool, ProtocolError> {
        acl.require_admin(caller)?;
        let removed = self.roster.remove(attester);
        if removed {
            log::info!("Attester {} removed by {}", attester, caller);
        }
        Ok(removed)
    }

    pub fn is_attester(&self, id: &AccountId) -> bool {
        self.roster.contains(id)
    }

    pub fn roster(&self) -> impl Iterator<Item = &AccountId> {
        self.roster.iter()
    }

    /// Record `attester`'s confirmation that `owner` has died.
    ///
    /// Returns `true` when this vote finalized the confirmation.
    pub fn submit_confirmation(
        &mut self,
        attester: &AccountId,
        owner: &AccountId,
        now: Timestamp,
    ) -> Result<bool, ProtocolError> {
        if !self.roster.contains(attester) {
            return Err(ProtocolError::Unauthorized(format!(
                "{} is not a registered attester",
                attester
            )));
        }

        let tally = self.tallies.entry(owner.clone()).or_default();
        if tally.finalized {
            return Err(ProtocolError::AlreadyFinalized(owner.clone()));
        }
        if tally.has_confirmed(attester) {
            return Err(ProtocolError::AlreadyConfirmed {
                attester: attester.clone(),
                owner: owner.clone(),
            });
        }

        tally.confirmations.push(Confirmation {
            attester: attester.clone(),
            at: now,
        });
        log::info!(
            "{} confirmed death of {} ({}/{})",
            attester,
            owner,
            tally.tally(),
            self.threshold
        );

        if tally.tally() >= self.threshold {
            tally.finalized = true;
            tally.finalized_at = Some(now);
            log::info!("Death of {} finalized", owner);
            return Ok(true);
        }
        Ok(false)
    }

    pub fn get(&self, owner: &AccountId) -> Option<&DeathConfirmation> {
        self.tallies.get(owner)
    }

    pub fn tally(&self, owner: &AccountId) -> usize {
        self.tallies.get(owner).map_or(0, DeathConfirmation::tally)
    }

    pub fn is_finalized(&self, owner: &AccountId) -> bool {
        self.tallies.get(owner).is_some_and(|t| t.finalized)
    }
}
