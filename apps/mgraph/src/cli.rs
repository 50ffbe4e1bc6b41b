// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use crate::config::{self, RunMode};
use crate::demo;

type LogInitFn = fn(&config::LogConfig) -> Result<(), Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "mgraph.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Runs the demo graph and prints a JSON summary
    Run {
        /// Overrides the configured run mode
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Overrides the configured duration in milliseconds
        #[arg(long)]
        duration_ms: Option<u64>,
    },
    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum ModeArg {
    Offline,
    Realtime,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Offline => Self::Offline,
            ModeArg::Realtime => Self::Realtime,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate a default config file and print it to stdout
    Default,
}

/// Handle the "run" command
/// Exits the process on error with status code 1
// Allow eprintln before logging is initialized, println for the summary
#[allow(clippy::disallowed_macros)]
fn handle_run_command(config_path: &str, mode: Option<ModeArg>, duration_ms: Option<u64>, init_logging: LogInitFn) {
    let config_result = match config::load(config_path) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        },
    };

    if let Err(e) = init_logging(&config_result.config.log) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    if let Some(missing_file) = &config_result.file_missing {
        warn!(config_path = %missing_file, "Config file not found, using defaults");
    }

    let mut demo_config = config_result.config.demo;
    if let Some(mode) = mode {
        demo_config.mode = mode.into();
    }
    if let Some(duration_ms) = duration_ms {
        demo_config.duration_ms = duration_ms;
    }
    info!(
        sample_rate = config_result.config.graph.sample_rate,
        target_period_ms = config_result.config.graph.target_period_ms,
        mode = ?demo_config.mode,
        "Starting mgraph"
    );

    let summary = match demo::run(&config_result.config.graph, &demo_config) {
        Ok(summary) => summary,
        Err(e) => {
            error!(error = %e, "Demo graph failed");
            std::process::exit(1);
        },
    };
    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            error!(error = %e, "Failed to serialize summary");
            std::process::exit(1);
        },
    }
}

/// Handle the "config default" command - print default config to stdout
// Allow println for CLI output to stdout (intentional)
#[allow(clippy::disallowed_macros)]
fn handle_config_default_command() {
    match config::generate_default() {
        Ok(toml_string) => {
            println!("# Default mgraph configuration file");
            println!("{toml_string}");
        },
        Err(e) => {
            eprintln!("Failed to generate default config: {e}");
            std::process::exit(1);
        },
    }
}

/// Handle CLI commands
pub fn handle_command(cli: &Cli, init_logging: LogInitFn) {
    match &cli.command {
        Some(Commands::Run { mode, duration_ms }) => {
            handle_run_command(&cli.config, *mode, *duration_ms, init_logging);
        },
        None => handle_run_command(&cli.config, None, None, init_logging),
        Some(Commands::Config(ConfigCommands::Default)) => handle_config_default_command(),
    }
}
