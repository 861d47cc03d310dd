//! The daemon loop: periodically runs upkeep over every registered owner.

use crate::config::ServerConfig;
use anyhow::{Context, Result};
use lastsignal_core::{Clock, SystemClock};
use lastsignal_inherit::{
    HeartbeatAction, Protocol, ProtocolEvent, ProtocolState, UpkeepReport, UpkeepScheduler,
};
use std::time::Duration;

/// Run the daemon loop. Blocks forever (until shutdown signal).
pub async fn run(config: ServerConfig) -> Result<()> {
    log::info!("LastSignal server starting…");
    log::info!("  Admin:      {}", config.protocol.admin);
    log::info!("  Threshold:  {} attesters", config.protocol.death_threshold);
    log::info!(
        "  Interval:   {} seconds ({:.1} hours)",
        config.server.check_interval_secs,
        config.server.check_interval_secs as f64 / 3600.0
    );
    log::info!("  Data dir:   {}", config.server.data_dir.display());

    let interval = Duration::from_secs(config.server.check_interval_secs);

    // Run first cycle immediately, then loop
    let mut first = true;
    loop {
        if !first {
            log::info!(
                "Sleeping {} seconds until next upkeep…",
                config.server.check_interval_secs
            );
            tokio::time::sleep(interval).await;
        }
        first = false;

        match run_check_cycle(&config) {
            Ok(report) => log::info!(
                "Upkeep cycle completed: {} checked, {} transitioned.",
                report.checked,
                report.transitioned.len()
            ),
            Err(e) => log::error!("Upkeep cycle failed: {:#}", e),
        }
    }
}

/// Execute a single upkeep cycle against the persisted state.
pub fn run_check_cycle(config: &ServerConfig) -> Result<UpkeepReport> {
    run_cycle_with_clock(config, SystemClock)
}

/// Load (or bootstrap) state, run upkeep, log what happened, save.
pub fn run_cycle_with_clock<C: Clock>(config: &ServerConfig, clock: C) -> Result<UpkeepReport> {
    let mut protocol = load_protocol(config, clock)?;

    let report = UpkeepScheduler::new().run_cycle(&mut protocol);
    for event in protocol.drain_events() {
        log_event(&event);
    }
    for status in report.needing_checkin() {
        log::warn!(
            "{} must ping within {} seconds ({:.0}% of timeout elapsed)",
            status.owner,
            status.seconds_remaining,
            status.elapsed_fraction * 100.0
        );
    }
    let expired = report
        .heartbeats
        .iter()
        .filter(|h| h.action == HeartbeatAction::Expired)
        .count();
    if expired > 0 {
        log::info!("{} owner(s) past their liveness deadline.", expired);
    }

    let state_path = config.state_path();
    protocol
        .into_state()
        .save(&state_path)
        .with_context(|| format!("Failed to save state to {}", state_path.display()))?;

    Ok(report)
}

fn load_protocol<C: Clock>(config: &ServerConfig, clock: C) -> Result<Protocol<C>> {
    let state_path = config.state_path();
    let loaded = ProtocolState::load(&state_path)
        .with_context(|| format!("Failed to load state from {}", state_path.display()))?;

    let state = match loaded {
        Some(state) => state,
        None => {
            log::info!(
                "No protocol state at {}; bootstrapping a fresh one.",
                state_path.display()
            );
            let protocol_config = config.protocol_config()?;
            ProtocolState::new(protocol_config, clock.now())
                .context("Failed to bootstrap protocol state")?
        }
    };
    Ok(Protocol::from_state(state, clock))
}

fn log_event(event: &ProtocolEvent) {
    match event {
        ProtocolEvent::SuspectedDead {
            owner,
            last_ping_time,
            at,
        } => {
            log::warn!(
                "{} is suspected dead: last ping at {}, {} seconds ago",
                owner,
                last_ping_time,
                at.saturating_sub(*last_ping_time)
            );
        }
        other if other.is_alert() => log::warn!("{:?}", other),
        other => log::debug!("{:?}", other),
    }
}
