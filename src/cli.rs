// src/cli.rs

//! CLI argument parsing for the `bootdag` demo binary, using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `bootdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "bootdag",
    version,
    about = "Run a plan of startup tasks in dependency order.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the plan file (TOML).
    ///
    /// Default: `Startup.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Startup.toml")]
    pub plan: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BOOTDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the plan in dependency order, but don't run
    /// any task.
    #[arg(long)]
    pub dry_run: bool,

    /// Give up waiting for the plan to complete after this many milliseconds.
    #[arg(long, value_name = "MS", default_value_t = 60_000)]
    pub wait_ms: u64,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
