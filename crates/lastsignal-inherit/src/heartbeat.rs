//! Heartbeat evaluation for registered owners.
//!
//! Pure logic: no I/O and no clock reads. Takes a liveness record and the
//! current time, returns a recommendation. The caller (upkeep scheduler,
//! daemon) decides whether to act on it.
//!
//! # How It Works
//!
//! Every ping restarts the timeout. The heartbeat module evaluates how much of
//! the timeout has elapsed and recommends action:
//!
//! ```text
//! |--- Healthy ---|--- CheckinRecommended ---|--- CheckinRequired ---|--- Expired
//! 0%             50%                        90%                    100%
//! ```
//!
//! Thresholds are configurable. Independently, an owner is `overdue` once more
//! than one ping `interval` has passed without a ping.

use crate::liveness::{LifeSignalRecord, LivenessStatus};
use lastsignal_core::{AccountId, Timestamp};
use serde::{Deserialize, Serialize};

/// When to recommend a ping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Fraction of timeout elapsed before recommending a ping (0.0–1.0).
    /// Default: 0.5 (halfway point).
    pub checkin_threshold: f64,

    /// Fraction of timeout elapsed before a ping is critical (0.0–1.0).
    /// Default: 0.9.
    pub critical_threshold: f64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            checkin_threshold: 0.5,
            critical_threshold: 0.9,
        }
    }
}

impl HeartbeatConfig {
    /// Validate that thresholds are sensible.
    pub fn validate(&self) -> Result<(), HeartbeatError> {
        if self.checkin_threshold <= 0.0 || self.checkin_threshold >= 1.0 {
            return Err(HeartbeatError::InvalidThreshold(
                "checkin_threshold must be between 0.0 and 1.0 exclusive".into(),
            ));
        }
        if self.critical_threshold <= self.checkin_threshold || self.critical_threshold >= 1.0 {
            return Err(HeartbeatError::InvalidThreshold(
                "critical_threshold must be between checkin_threshold and 1.0 exclusive".into(),
            ));
        }
        Ok(())
    }
}

/// What the heartbeat recommends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeartbeatAction {
    /// Far from the deadline. No action needed.
    Healthy,
    /// Passed the check-in threshold. Owner should ping soon.
    CheckinRecommended,
    /// Passed the critical threshold. Owner must ping now.
    CheckinRequired,
    /// Timeout exceeded (or already suspected dead).
    Expired,
}

impl HeartbeatAction {
    fn priority(self) -> u8 {
        match self {
            HeartbeatAction::Expired => 0,
            HeartbeatAction::CheckinRequired => 1,
            HeartbeatAction::CheckinRecommended => 2,
            HeartbeatAction::Healthy => 3,
        }
    }
}

/// Full heartbeat status for one owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatStatus {
    pub owner: AccountId,
    /// Seconds until the deadline; negative once it has passed.
    pub seconds_remaining: i64,
    /// Fraction of timeout elapsed (0.0–1.0+).
    pub elapsed_fraction: f64,
    /// More than one ping interval has passed since the last ping.
    pub overdue: bool,
    /// Recommended action.
    pub action: HeartbeatAction,
}

/// Errors from heartbeat evaluation.
#[derive(Debug, thiserror::Error)]
pub enum HeartbeatError {
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),
}

/// Evaluate the heartbeat of one owner.
///
/// # Arguments
/// * `owner`: the owner the record belongs to
/// * `record`: its liveness record
/// * `now`: current time
/// * `config`: heartbeat thresholds
pub fn evaluate_heartbeat(
    owner: &AccountId,
    record: &LifeSignalRecord,
    now: Timestamp,
    config: &HeartbeatConfig,
) -> HeartbeatStatus {
    let elapsed = record.elapsed(now);
    // register() rejects a zero timeout, so the division is safe
    let elapsed_fraction = elapsed as f64 / record.timeout.max(1) as f64;
    let seconds_remaining = seconds_until(record.deadline(), now);

    let action = if record.status == LivenessStatus::SuspectedDead || record.is_lapsed(now) {
        HeartbeatAction::Expired
    } else if elapsed_fraction >= config.critical_threshold {
        HeartbeatAction::CheckinRequired
    } else if elapsed_fraction >= config.checkin_threshold {
        HeartbeatAction::CheckinRecommended
    } else {
        HeartbeatAction::Healthy
    };

    HeartbeatStatus {
        owner: owner.clone(),
        seconds_remaining,
        elapsed_fraction,
        overdue: elapsed > record.interval,
        action,
    }
}

/// Signed distance from `now` to `deadline`, clamped to the `i64` range.
fn seconds_until(deadline: Timestamp, now: Timestamp) -> i64 {
    let diff = i128::from(deadline) - i128::from(now);
    i64::try_from(diff).unwrap_or(if diff < 0 { i64::MIN } else { i64::MAX })
}

/// Batch evaluate heartbeats.
///
/// Returns statuses sorted by urgency (most urgent first, then by elapsed
/// fraction descending).
pub fn evaluate_batch<'a>(
    records: impl IntoIterator<Item = (&'a AccountId, &'a LifeSignalRecord)>,
    now: Timestamp,
    config: &HeartbeatConfig,
) -> Vec<HeartbeatStatus> {
    let mut statuses: Vec<HeartbeatStatus> = records
        .into_iter()
        .map(|(owner, record)| evaluate_heartbeat(owner, record, now, config))
        .collect();

    statuses.sort_by(|a, b| {
        a.action.priority().cmp(&b.action.priority()).then(
            a.elapsed_fraction
                .partial_cmp(&b.elapsed_fraction)
                .unwrap_or(std::cmp::Ordering::Equal)
                .reverse(),
        )
    });

    statuses
}
