//! Protocol error taxonomy
//!
//! Every failing operation reports exactly one [`ProtocolError`]. Errors fall
//! into three kinds:
//!
//! ```text
//! Authorization: caller lacks the required capability
//! StateConflict: already done; nothing changed, but the caller is told so
//! Precondition: fix the input or wait for a condition to hold
//! ```
//!
//! There is no transient kind: an operation either fully applies or fully fails.

use crate::ids::AccountId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Attester {attester} already confirmed death of {owner}")]
    AlreadyConfirmed { attester: AccountId, owner: AccountId },

    #[error("Death of {0} is already finalized")]
    AlreadyFinalized(AccountId),

    #[error("Vault of {0} was already released")]
    AlreadyReleased(AccountId),

    #[error("Vault already exists for {0}")]
    VaultAlreadyExists(AccountId),

    #[error("Heir {heir} is already registered for {owner}")]
    DuplicateHeir { owner: AccountId, heir: AccountId },

    #[error("Account already registered: {0}")]
    AlreadyRegistered(AccountId),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Release threshold not met for {0}")]
    ThresholdNotMet(AccountId),

    #[error("Vault of {0} has been released")]
    VaultReleased(AccountId),

    #[error("Account not registered: {0}")]
    NotRegistered(AccountId),

    #[error("No vault for {0}")]
    NoVault(AccountId),

    #[error("No heirs registered for {0}")]
    NoHeirs(AccountId),

    #[error("Heir {heir} not found for {owner}")]
    HeirNotFound { owner: AccountId, heir: AccountId },

    #[error("Asset transfer failed: {0}")]
    TransferFailed(String),
}

/// Coarse classification of a [`ProtocolError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authorization,
    StateConflict,
    Precondition,
}

impl ProtocolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::Unauthorized(_) => ErrorKind::Authorization,
            ProtocolError::AlreadyConfirmed { .. }
            | ProtocolError::AlreadyFinalized(_)
            | ProtocolError::AlreadyReleased(_)
            | ProtocolError::VaultAlreadyExists(_)
            | ProtocolError::DuplicateHeir { .. }
            | ProtocolError::AlreadyRegistered(_) => ErrorKind::StateConflict,
            ProtocolError::InvalidParameter(_)
            | ProtocolError::ThresholdNotMet(_)
            | ProtocolError::VaultReleased(_)
            | ProtocolError::NotRegistered(_)
            | ProtocolError::NoVault(_)
            | ProtocolError::NoHeirs(_)
            | ProtocolError::HeirNotFound { .. }
            | ProtocolError::TransferFailed(_) => ErrorKind::Precondition,
        }
    }

    /// True for "already done" outcomes a caller may treat as benign.
    pub fn is_state_conflict(&self) -> bool {
        self.kind() == ErrorKind::StateConflict
    }
}
