//! Capability table
//!
//! Two coarse capabilities guard every mutating operation:
//!
//! - **Admin**: attester roster and capability management. One root admin is
//!   installed at bootstrap; further grants come only from an existing admin.
//! - **VaultManager(owner)**: lets a principal other than the owner wire heir
//!   associations for that one owner. Granted to the vault factory while it
//!   instantiates a vault.
//!
//! Every grant and revoke is appended to an audit log.

use crate::clock::Timestamp;
use crate::error::ProtocolError;
use crate::ids::AccountId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Capability {
    Admin,
    VaultManager { owner: AccountId },
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Admin => write!(f, "admin"),
            Capability::VaultManager { owner } => write!(f, "vault-manager({})", owner),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrantAction {
    Grant,
    Revoke,
}

/// One entry of the capability audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRecord {
    pub action: GrantAction,
    pub principal: AccountId,
    pub capability: Capability,
    /// Principal that performed the change
    pub by: AccountId,
    pub at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessControl {
    grants: BTreeMap<AccountId, BTreeSet<Capability>>,
    /// Principal allowed to self-delegate VaultManager during vault setup
    factory: Option<AccountId>,
    audit: Vec<GrantRecord>,
}

impl AccessControl {
    /// Bootstrap the table with a single root admin.
    pub fn new(root_admin: AccountId, now: Timestamp) -> Self {
        let mut acl = Self {
            grants: BTreeMap::new(),
            factory: None,
            audit: Vec::new(),
        };
        acl.insert(&root_admin, Capability::Admin, &root_admin, now);
        acl
    }

    pub fn has(&self, principal: &AccountId, capability: &Capability) -> bool {
        self.grants
            .get(principal)
            .is_some_and(|caps| caps.contains(capability))
    }

    pub fn is_admin(&self, principal: &AccountId) -> bool {
        self.has(principal, &Capability::Admin)
    }

    /// Owner itself, or a holder of VaultManager scoped to `owner`.
    pub fn can_manage(&self, principal: &AccountId, owner: &AccountId) -> bool {
        principal == owner
            || self.has(
                principal,
                &Capability::VaultManager {
                    owner: owner.clone(),
                },
            )
    }

    pub fn require_admin(&self, caller: &AccountId) -> Result<(), ProtocolError> {
        if self.is_admin(caller) {
            Ok(())
        } else {
            Err(ProtocolError::Unauthorized(format!(
                "{} does not hold the admin capability",
                caller
            )))
        }
    }

    pub fn require_manager(
        &self,
        caller: &AccountId,
        owner: &AccountId,
    ) -> Result<(), ProtocolError> {
        if self.can_manage(caller, owner) {
            Ok(())
        } else {
            Err(ProtocolError::Unauthorized(format!(
                "{} may not manage heirs of {}",
                caller, owner
            )))
        }
    }

    /// Grant a capability. Admin-only. Returns `false` if already held.
    pub fn grant(
        &mut self,
        caller: &AccountId,
        principal: &AccountId,
        capability: Capability,
        now: Timestamp,
    ) -> Result<bool, ProtocolError> {
        self.require_admin(caller)?;
        if self.has(principal, &capability) {
            return Ok(false);
        }
        log::info!("{} granted {} to {}", caller, capability, principal);
        self.insert(principal, capability, caller, now);
        Ok(true)
    }

    /// Revoke a capability. Admin-only. Returns `false` if it was not held.
    ///
    /// The last remaining admin cannot be revoked.
    pub fn revoke(
        &mut self,
        caller: &AccountId,
        principal: &AccountId,
        capability: &Capability,
        now: Timestamp,
    ) -> Result<bool, ProtocolError> {
        self.require_admin(caller)?;
        if !self.has(principal, capability) {
            return Ok(false);
        }
        if *capability == Capability::Admin && self.admin_count() == 1 {
            return Err(ProtocolError::InvalidParameter(
                "cannot revoke the last admin".into(),
            ));
        }

        if let Some(caps) = self.grants.get_mut(principal) {
            caps.remove(capability);
            if caps.is_empty() {
                self.grants.remove(principal);
            }
        }
        log::info!("{} revoked {} from {}", caller, capability, principal);
        self.audit.push(GrantRecord {
            action: GrantAction::Revoke,
            principal: principal.clone(),
            capability: capability.clone(),
            by: caller.clone(),
            at: now,
        });
        Ok(true)
    }

    /// Designate the vault factory principal. Admin-only.
    pub fn set_factory(
        &mut self,
        caller: &AccountId,
        factory: AccountId,
    ) -> Result<(), ProtocolError> {
        self.require_admin(caller)?;
        self.factory = Some(factory);
        Ok(())
    }

    pub fn factory(&self) -> Option<&AccountId> {
        self.factory.as_ref()
    }

    /// Self-grant of VaultManager(owner) by the designated factory.
    ///
    /// Recorded in the audit log like any other grant, and revocable by an admin.
    pub fn delegate_vault_manager(
        &mut self,
        factory: &AccountId,
        owner: &AccountId,
        now: Timestamp,
    ) -> Result<bool, ProtocolError> {
        if self.factory.as_ref() != Some(factory) {
            return Err(ProtocolError::Unauthorized(format!(
                "{} is not the designated vault factory",
                factory
            )));
        }
        let capability = Capability::VaultManager {
            owner: owner.clone(),
        };
        if self.has(factory, &capability) {
            return Ok(false);
        }
        self.insert(factory, capability, factory, now);
        Ok(true)
    }

    pub fn capabilities(&self, principal: &AccountId) -> Vec<Capability> {
        self.grants
            .get(principal)
            .map(|caps| caps.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn admin_count(&self) -> usize {
        self.grants
            .values()
            .filter(|caps| caps.contains(&Capability::Admin))
            .count()
    }

    pub fn audit_log(&self) -> &[GrantRecord] {
        &self.audit
    }

    fn insert(
        &mut self,
        principal: &AccountId,
        capability: Capability,
        by: &AccountId,
        now: Timestamp,
    ) {
        self.grants
            .entry(principal.clone())
            .or_default()
            .insert(capability.clone());
        self.audit.push(GrantRecord {
            action: GrantAction::Grant,
            principal: principal.clone(),
            capability,
            by: by.clone(),
            at: now,
        });
    }
}
