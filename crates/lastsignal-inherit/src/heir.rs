//! Heir management
//!
//! Each owner keeps an ordered list of heirs with opaque share weights. Only
//! the owner, or a principal holding VaultManager scoped to that owner, may
//! read or change the list. Shares are not required to sum to anything; the
//! vault normalizes them at release time.

use lastsignal_core::{AccessControl, AccountId, ProtocolError, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An heir and its weight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeirEntry {
    pub heir: AccountId,
    /// Relative weight; payout is `share / total × balance`
    pub share: u64,
    pub added_at: Timestamp,
    /// Principal that registered the heir (owner or vault manager)
    pub added_by: AccountId,
}

/// Per-owner heir lists
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeirRegistry {
    heirs: BTreeMap<AccountId, Vec<HeirEntry>>,
}

impl HeirRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_heir(
        &mut self,
        acl: &AccessControl,
        caller: &AccountId,
        owner: &AccountId,
        heir: &AccountId,
        share: u64,
        now: Timestamp,
    ) -> Result<(), ProtocolError> {
        acl.require_manager(caller, owner)?;
        if share == 0 {
            return Err(ProtocolError::InvalidParameter(
                "heir share must be > 0".into(),
            ));
        }
        if heir == owner {
            return Err(ProtocolError::InvalidParameter(
                "an owner cannot be its own heir".into(),
            ));
        }

        let list = self.heirs.entry(owner.clone()).or_default();
        if list.iter().any(|e| &e.heir == heir) {
            return Err(ProtocolError::DuplicateHeir {
                owner: owner.clone(),
                heir: heir.clone(),
            });
        }
        list.push(HeirEntry {
            heir: heir.clone(),
            share,
            added_at: now,
            added_by: caller.clone(),
        });
        log::info!("Heir {} (share {}) registered for {}", heir, share, owner);
        Ok(())
    }

    pub fn remove_heir(
        &mut self,
        acl: &AccessControl,
        caller: &AccountId,
        owner: &AccountId,
        heir: &AccountId,
    ) -> Result<HeirEntry, ProtocolError> {
        acl.require_manager(caller, owner)?;
        let not_found = || ProtocolError::HeirNotFound {
            owner: owner.clone(),
            heir: heir.clone(),
        };

        let list = self.heirs.get_mut(owner).ok_or_else(not_found)?;
        let idx = list
            .iter()
            .position(|e| &e.heir == heir)
            .ok_or_else(not_found)?;
        let removed = list.remove(idx);
        if list.is_empty() {
            self.heirs.remove(owner);
        }
        log::info!("Heir {} removed for {}", heir, owner);
        Ok(removed)
    }

    pub fn list_heirs(
        &self,
        acl: &AccessControl,
        caller: &AccountId,
        owner: &AccountId,
    ) -> Result<&[HeirEntry], ProtocolError> {
        acl.require_manager(caller, owner)?;
        Ok(self.heirs_of(owner))
    }

    /// Heirs of `owner` in registration order, without an authorization check.
    pub(crate) fn heirs_of(&self, owner: &AccountId) -> &[HeirEntry] {
        self.heirs.get(owner).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self, owner: &AccountId) -> usize {
        self.heirs_of(owner).len()
    }

    pub fn is_empty(&self, owner: &AccountId) -> bool {
        self.heirs_of(owner).is_empty()
    }
}
