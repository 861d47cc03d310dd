//! Asset transfer seam
//!
//! Vaults do not move assets themselves; they hand a batch of payouts to an
//! [`AssetLedger`]. Implementations must be all-or-nothing: either every
//! payout in the batch lands or none does.

use lastsignal_core::AccountId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Recipient rejected the transfer: {0}")]
    RecipientRejected(AccountId),

    #[error("Balance overflow for {0}")]
    Overflow(AccountId),

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

/// Amount owed to one heir.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub heir: AccountId,
    pub amount: u64,
}

pub trait AssetLedger {
    /// Move every payout out of `from`, atomically.
    fn transfer_batch(&mut self, from: &AccountId, payouts: &[Payout]) -> Result<(), LedgerError>;
}

/// A completed transfer, as recorded by [`InMemoryLedger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub from: AccountId,
    pub to: AccountId,
    pub amount: u64,
}

/// Ledger kept in memory: validates the whole batch before applying any of it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryLedger {
    balances: BTreeMap<AccountId, u64>,
    /// Recipients whose transfers fail (simulates frozen or invalid accounts)
    rejected: BTreeSet<AccountId>,
    history: Vec<TransferRecord>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, account: &AccountId) -> u64 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Make every future transfer to `recipient` fail.
    pub fn reject(&mut self, recipient: AccountId) {
        self.rejected.insert(recipient);
    }

    pub fn accept(&mut self, recipient: &AccountId) {
        self.rejected.remove(recipient);
    }

    pub fn history(&self) -> &[TransferRecord] {
        &self.history
    }
}

impl AssetLedger for InMemoryLedger {
    fn transfer_batch(&mut self, from: &AccountId, payouts: &[Payout]) -> Result<(), LedgerError> {
        // Validate against a scratch copy so a failure leaves nothing applied
        let mut staged = self.balances.clone();
        for payout in payouts {
            if self.rejected.contains(&payout.heir) {
                return Err(LedgerError::RecipientRejected(payout.heir.clone()));
            }
            let balance = staged.entry(payout.heir.clone()).or_insert(0);
            *balance = balance
                .checked_add(payout.amount)
                .ok_or_else(|| LedgerError::Overflow(payout.heir.clone()))?;
        }

        self.balances = staged;
        self.history.extend(payouts.iter().map(|p| TransferRecord {
            from: from.clone(),
            to: p.heir.clone(),
            amount: p.amount,
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::account;

    fn payout(heir: &str, amount: u64) -> Payout {
        Payout {
            heir: account(heir),
            amount,
        }
    }

    #[test]
    fn test_batch_applies_all() {
        let mut ledger = InMemoryLedger::new();
        ledger
            .transfer_batch(&account("vault"), &[payout("h1", 25), payout("h2", 75)])
            .unwrap();

        assert_eq!(ledger.balance_of(&account("h1")), 25);
        assert_eq!(ledger.balance_of(&account("h2")), 75);
        assert_eq!(ledger.history().len(), 2);
    }

    #[test]
    fn test_rejected_recipient_applies_nothing() {
        let mut ledger = InMemoryLedger::new();
        ledger.reject(account("h2"));

        let err = ledger
            .transfer_batch(&account("vault"), &[payout("h1", 25), payout("h2", 75)])
            .unwrap_err();
        assert_eq!(err, LedgerError::RecipientRejected(account("h2")));
        assert_eq!(ledger.balance_of(&account("h1")), 0);
        assert!(ledger.history().is_empty());

        ledger.accept(&account("h2"));
        assert!(ledger
            .transfer_batch(&account("vault"), &[payout("h2", 1)])
            .is_ok());
    }

    #[test]
    fn test_overflow_applies_nothing() {
        let mut ledger = InMemoryLedger::new();
        ledger
            .transfer_batch(&account("vault"), &[payout("h2", u64::MAX)])
            .unwrap();

        let err = ledger
            .transfer_batch(&account("vault"), &[payout("h1", 5), payout("h2", 1)])
            .unwrap_err();
        assert!(matches!(err, LedgerError::Overflow(_)));
        assert_eq!(ledger.balance_of(&account("h1")), 0);
    }
}
