//! LastSignal Inheritance Module
//!
//! Dead-man's-switch inheritance: an owner proves liveness by pinging; if the
//! pings stop, a quorum of attesters confirms death; only when both signals
//! agree may the owner's vault pay out to the registered heirs.
//!
//! # Components
//!
//! - [`liveness`]: per-owner liveness record and timeout detection
//! - [`heartbeat`]: pure urgency classification of liveness records
//! - [`quorum`]: attester roster and per-owner death confirmation tally
//! - [`heir`]: per-owner heir list with weighted shares
//! - [`release`]: stateless gate combining liveness lapse and death quorum
//! - [`vault`]: per-owner vaults instantiated from a shared template
//! - [`ledger`]: the asset transfer seam vaults pay out through
//! - [`protocol`]: facade wiring everything to a clock and an event journal
//! - [`upkeep`]: adapter for the periodic scheduler
//!
//! # Lifecycle
//!
//! ```text
//! Alive ──(no ping for > timeout, transition)──> SuspectedDead
//!   ^                                                 |
//!   └──────────────(ping, not yet finalized)──────────┘
//!
//! release authorized  <=>  SuspectedDead  AND  death quorum finalized
//! ```

pub mod events;
pub mod heartbeat;
pub mod heir;
pub mod ledger;
pub mod liveness;
pub mod protocol;
pub mod quorum;
pub mod release;
pub mod state;
pub mod upkeep;
pub mod vault;

#[cfg(test)]
pub(crate) mod test_utils;

pub use events::ProtocolEvent;
pub use heartbeat::{HeartbeatAction, HeartbeatConfig, HeartbeatError, HeartbeatStatus};
pub use heir::{HeirEntry, HeirRegistry};
pub use ledger::{AssetLedger, InMemoryLedger, LedgerError, Payout, TransferRecord};
pub use liveness::{LifeSignalMonitor, LifeSignalRecord, LivenessStatus};
pub use protocol::{OwnerStatus, Protocol, ProtocolConfig};
pub use quorum::{DeathConfirmation, DeathConfirmationQuorum};
pub use release::{ReleaseAuthorization, ReleaseController};
pub use state::{ProtocolState, StateError};
pub use upkeep::{UpkeepReport, UpkeepScheduler, UpkeepTarget};
pub use vault::{compute_payouts, VaultFactory, VaultInstance, VaultTemplate};

pub use lastsignal_core::{AccountId, ProtocolError};
