//! LastSignal Server: headless upkeep daemon
//!
//! Loads the persisted protocol state and periodically moves owners whose
//! liveness has lapsed to `SuspectedDead`. It is the reference caller of the
//! upkeep interface, not a network service.
//!
//! # Usage
//!
//! ```bash
//! lastsignal-server --config /path/to/lastsignal-server.toml
//! lastsignal-server --check   # Run one upkeep cycle and exit
//! lastsignal-server --validate # Validate config and exit
//! ```

mod config;
mod daemon;

use anyhow::{Context, Result};
use std::path::PathBuf;

fn main() -> Result<()> {
    // Parse CLI args (minimal, no clap dependency needed)
    let args: Vec<String> = std::env::args().collect();

    let mut config_path = PathBuf::from("/config/lastsignal-server.toml");
    let mut one_shot = false;
    let mut validate_only = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    config_path = PathBuf::from(&args[i]);
                } else {
                    anyhow::bail!("--config requires a path argument");
                }
            }
            "--check" | "--once" => {
                one_shot = true;
            }
            "--validate" => {
                validate_only = true;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--version" | "-V" => {
                println!("lastsignal-server {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            other => {
                anyhow::bail!("Unknown argument: {}", other);
            }
        }
        i += 1;
    }

    let mut server_config = config::ServerConfig::from_file(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    server_config.apply_env_overrides();

    server_config
        .validate()
        .context("Configuration validation failed")?;

    // Init logger
    std::env::set_var("RUST_LOG", &server_config.server.log_level);
    env_logger::init();

    if validate_only {
        println!("Configuration is valid.");
        println!("  Admin:          {}", server_config.protocol.admin);
        println!("  Factory:        {}", server_config.protocol.factory);
        println!(
            "  Death quorum:   {} attesters",
            server_config.protocol.death_threshold
        );
        println!(
            "  Release needs:  {} signal(s)",
            server_config.protocol.required_confirmations
        );
        println!("  Asset:          {}", server_config.protocol.asset);
        println!(
            "  Check interval: {} secs",
            server_config.server.check_interval_secs
        );
        println!("  State file:     {}", server_config.state_path().display());
        return Ok(());
    }

    if one_shot {
        log::info!("Running single upkeep cycle…");
        let report = daemon::run_check_cycle(&server_config)?;
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
        log::info!("Done.");
        return Ok(());
    }

    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;

    // Install Ctrl-C handler for graceful shutdown
    let shutdown = rt.block_on(async {
        tokio::select! {
            result = daemon::run(server_config) => result,
            _ = tokio::signal::ctrl_c() => {
                log::info!("Received shutdown signal. Exiting…");
                Ok(())
            }
        }
    });

    if let Err(e) = shutdown {
        log::error!("Server error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn print_help() {
    println!(
        r#"LastSignal Server: headless liveness upkeep daemon

USAGE:
    lastsignal-server [OPTIONS]

OPTIONS:
    -c, --config <PATH>   Config file path (default: /config/lastsignal-server.toml)
    --check, --once       Run a single upkeep cycle, print the report and exit
    --validate            Validate config file and exit
    -h, --help            Show this help message
    -V, --version         Show version

ENVIRONMENT VARIABLES (override config file):
    LASTSIGNAL_DATA_DIR          Data directory path
    LASTSIGNAL_CHECK_INTERVAL    Upkeep interval in seconds
    LASTSIGNAL_LOG_LEVEL         Log level (error/warn/info/debug/trace)
    LASTSIGNAL_ADMIN             Root admin principal
    LASTSIGNAL_DEATH_THRESHOLD   Attester votes needed to finalize a death

EXAMPLES:
    # Run as daemon with config file
    lastsignal-server --config /path/to/config.toml

    # Single cycle (useful for cron jobs)
    lastsignal-server --config config.toml --check

    # Validate configuration
    lastsignal-server --config config.toml --validate
"#
    );
}
