//! Principal identities
//!
//! Every participant (owner, heir, attester, admin, factory) is an opaque
//! [`AccountId`]. The protocol never interprets the contents; a public key
//! in hex is the usual choice.

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque unique identifier of a principal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Create an identifier from any non-empty label.
    pub fn new(id: impl Into<String>) -> Result<Self, ProtocolError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ProtocolError::InvalidParameter(
                "account id must not be empty".into(),
            ));
        }
        Ok(Self(id))
    }

    /// Identifier derived from raw public key bytes (lowercase hex).
    pub fn from_pubkey(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.is_empty() {
            return Err(ProtocolError::InvalidParameter(
                "public key must not be empty".into(),
            ));
        }
        Ok(Self(hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for AccountId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
