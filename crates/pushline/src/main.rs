// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pushline - push notification batching and delivery engine.
//!
//! This is the binary entry point.

mod logging_adapter;
mod simulate;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use pushline_config::PushlineConfig;
use pushline_core::Where;

/// Pushline - push notification batching and delivery engine.
#[derive(Parser, Debug)]
#[command(name = "pushline", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the resolved configuration as TOML.
    Config,
    /// Run one push through an in-process pipeline with generated devices.
    Simulate {
        /// Number of generated devices.
        #[arg(long, default_value_t = 25)]
        devices: usize,
        /// Push payload as JSON.
        #[arg(long, default_value = r#"{"data":{"alert":"Hello from pushline"}}"#)]
        payload: String,
        /// Device constraint as a JSON object.
        #[arg(long = "where")]
        where_: Option<String>,
        /// Seconds to wait for delivery before giving up.
        #[arg(long, default_value_t = 10)]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => pushline_config::load_and_validate_path(path),
        None => pushline_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            pushline_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.service.log_level);

    match cli.command {
        Some(Commands::Config) => match toml::to_string_pretty(&config) {
            Ok(rendered) => print!("{rendered}"),
            Err(e) => {
                eprintln!("pushline: failed to render config: {e}");
                std::process::exit(1);
            }
        },
        Some(Commands::Simulate {
            devices,
            payload,
            where_,
            timeout,
        }) => {
            if let Err(e) = run_simulate(&config, devices, &payload, where_.as_deref(), timeout).await
            {
                eprintln!("pushline: {e}");
                std::process::exit(1);
            }
        }
        None => {
            println!("pushline: use --help for available commands");
        }
    }
}

async fn run_simulate(
    config: &PushlineConfig,
    devices: usize,
    payload: &str,
    where_: Option<&str>,
    timeout: u64,
) -> Result<(), pushline_core::PushError> {
    let options = simulate::SimulateOptions {
        devices,
        payload: serde_json::from_str(payload)?,
        where_: match where_ {
            Some(raw) => simulate::parse_where(raw)?,
            None => Where::new(),
        },
        timeout: Duration::from_secs(timeout),
    };
    let snapshot = simulate::simulate(config, options).await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides `service.log_level`.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "pushline={log_level},pushline_push={log_level},pushline_bus={log_level},warn"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
