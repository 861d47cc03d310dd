//! LastSignal Core
//!
//! Shared types for the LastSignal inheritance protocol.
//!
//! # Contents
//!
//! - **Identities**: opaque [`AccountId`] principals (owners, heirs, attesters, admins)
//! - **Time**: the [`Clock`] seam and the [`Timestamp`] / [`Duration`] units it speaks
//! - **Capabilities**: the [`AccessControl`] table holding Admin and owner-scoped
//!   VaultManager grants
//! - **Errors**: the [`ProtocolError`] taxonomy shared by every component

pub mod access;
pub mod clock;
pub mod error;
pub mod ids;

pub use access::{AccessControl, Capability, GrantAction, GrantRecord};
pub use clock::{Clock, Duration, ManualClock, SystemClock, Timestamp};
pub use error::{ErrorKind, ProtocolError};
pub use ids::AccountId;
