//! Per-owner vaults
//!
//! The [`VaultFactory`] keeps an arena of [`VaultInstance`]s keyed by owner.
//! Every instance shares the factory's single immutable [`VaultTemplate`],
//! which carries the distribution rules; instances hold only their own
//! balance and lifecycle flags.
//!
//! A vault's balance leaves only through [`VaultFactory::release`], at most
//! once, and only with a [`ReleaseAuthorization`].

use crate::heir::HeirEntry;
use crate::ledger::{AssetLedger, Payout};
use crate::release::ReleaseAuthorization;
use lastsignal_core::{AccessControl, AccountId, ProtocolError, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Shared configuration every vault is instantiated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultTemplate {
    /// Asset label (e.g. "sat"), informational
    pub asset: String,
    /// Smallest accepted deposit
    pub min_deposit: u64,
}

impl Default for VaultTemplate {
    fn default() -> Self {
        Self {
            asset: "sat".into(),
            min_deposit: 1,
        }
    }
}

impl VaultTemplate {
    /// Split `balance` across `heirs` by share. See [`compute_payouts`].
    pub fn distribute(&self, balance: u64, heirs: &[HeirEntry]) -> Vec<Payout> {
        compute_payouts(balance, heirs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultInstance {
    pub owner: AccountId,
    pub balance: u64,
    pub released: bool,
    pub created_at: Timestamp,
    pub released_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultFactory {
    /// Principal the factory acts as when wiring heirs
    id: AccountId,
    template: VaultTemplate,
    vaults: BTreeMap<AccountId, VaultInstance>,
}

impl VaultFactory {
    pub fn new(id: AccountId, template: VaultTemplate) -> Self {
        Self {
            id,
            template,
            vaults: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &AccountId {
        &self.id
    }

    pub fn template(&self) -> &VaultTemplate {
        &self.template
    }

    /// Instantiate the vault for `owner` and self-grant VaultManager(owner).
    pub fn create_vault(
        &mut self,
        acl: &mut AccessControl,
        owner: &AccountId,
        now: Timestamp,
    ) -> Result<(), ProtocolError> {
        if self.vaults.contains_key(owner) {
            return Err(ProtocolError::VaultAlreadyExists(owner.clone()));
        }
        acl.delegate_vault_manager(&self.id, owner, now)?;

        self.vaults.insert(
            owner.clone(),
            VaultInstance {
                owner: owner.clone(),
                balance: 0,
                released: false,
                created_at: now,
                released_at: None,
            },
        );
        log::info!("Vault created for {}", owner);
        Ok(())
    }

    /// Add `amount` to the owner's vault. Owner-only. Returns the new balance.
    pub fn deposit(
        &mut self,
        caller: &AccountId,
        owner: &AccountId,
        amount: u64,
    ) -> Result<u64, ProtocolError> {
        if caller != owner {
            return Err(ProtocolError::Unauthorized(format!(
                "{} cannot deposit into the vault of {}",
                caller, owner
            )));
        }
        let min_deposit = self.template.min_deposit.max(1);
        let vault = self
            .vaults
            .get_mut(owner)
            .ok_or_else(|| ProtocolError::NoVault(owner.clone()))?;
        if vault.released {
            return Err(ProtocolError::VaultReleased(owner.clone()));
        }
        if amount < min_deposit {
            return Err(ProtocolError::InvalidParameter(format!(
                "deposit must be at least {}",
                min_deposit
            )));
        }

        vault.balance = vault.balance.checked_add(amount).ok_or_else(|| {
            ProtocolError::InvalidParameter("deposit would overflow the vault balance".into())
        })?;
        log::info!(
            "Deposited {} {} into vault of {} (balance {})",
            amount,
            self.template.asset,
            owner,
            vault.balance
        );
        Ok(vault.balance)
    }

    /// Distribute the vault to `heirs` and mark it released.
    ///
    /// If the ledger rejects the batch the vault is left exactly as it was.
    pub fn release(
        &mut self,
        authorization: ReleaseAuthorization,
        heirs: &[HeirEntry],
        ledger: &mut dyn AssetLedger,
        now: Timestamp,
    ) -> Result<Vec<Payout>, ProtocolError> {
        let owner = authorization.owner().clone();
        let vault = self
            .vaults
            .get_mut(&owner)
            .ok_or_else(|| ProtocolError::NoVault(owner.clone()))?;
        if vault.released {
            return Err(ProtocolError::AlreadyReleased(owner));
        }
        if heirs.is_empty() {
            return Err(ProtocolError::NoHeirs(owner));
        }

        let payouts = self.template.distribute(vault.balance, heirs);
        ledger
            .transfer_batch(&owner, &payouts)
            .map_err(|e| ProtocolError::TransferFailed(e.to_string()))?;

        log::info!(
            "Vault of {} released: {} {} to {} heirs",
            owner,
            vault.balance,
            self.template.asset,
            payouts.len()
        );
        vault.balance = 0;
        vault.released = true;
        vault.released_at = Some(now);
        Ok(payouts)
    }

    pub fn get(&self, owner: &AccountId) -> Option<&VaultInstance> {
        self.vaults.get(owner)
    }

    pub fn contains(&self, owner: &AccountId) -> bool {
        self.vaults.contains_key(owner)
    }

    pub fn vaults(&self) -> impl Iterator<Item = &VaultInstance> {
        self.vaults.values()
    }
}

/// Split `balance` proportionally to each heir's share.
///
/// Each heir receives `floor(balance × share / Σshares)`. The rounding
/// remainder goes to the first-listed heir, so the payouts always sum to
/// exactly `balance`. Returns an empty list when there are no heirs.
pub fn compute_payouts(balance: u64, heirs: &[HeirEntry]) -> Vec<Payout> {
    let total: u128 = heirs.iter().map(|h| h.share as u128).sum();
    if total == 0 {
        return Vec::new();
    }

    let mut payouts: Vec<Payout> = heirs
        .iter()
        .map(|h| Payout {
            heir: h.heir.clone(),
            // share ≤ total, so the quotient fits back into u64
            amount: (balance as u128 * h.share as u128 / total) as u64,
        })
        .collect();

    let distributed: u64 = payouts.iter().map(|p| p.amount).sum();
    if let Some(first) = payouts.first_mut() {
        first.amount += balance - distributed;
    }
    payouts
}
