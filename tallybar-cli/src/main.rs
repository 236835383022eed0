// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! `TallyBar` CLI - API billing balance monitoring from the command line.
//!
//! # Examples
//!
//! ```bash
//! # Register an account
//! tallybar tenants add work https://api.example.com --token sk-... --user-id 42
//!
//! # Refresh every tenant (default when no command is given)
//! tallybar
//!
//! # Usage analytics for the last week
//! tallybar analytics --period 7d
//!
//! # Alert when today's usage crosses $5
//! tallybar alert set work 5
//!
//! # Run the background modules until Ctrl-C
//! tallybar daemon
//!
//! # JSON output
//! tallybar tenants list --format json --pretty
//! ```

mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{alert, analytics, badge, config, daemon, refresh, tenants, tokens};

// ============================================================================
// CLI Definition
// ============================================================================

/// `TallyBar` CLI - API billing balance monitoring.
#[derive(Parser)]
#[command(name = "tallybar")]
#[command(about = "Balance and usage monitoring for API billing platforms")]
#[command(long_about = r#"
TallyBar tracks balances, usage and API tokens across accounts on
self-hosted API billing platforms.

Supported platforms:
  • New API (newapi)
  • One API (oneapi)
  • One Hub (onehub)
  • Veloera (veloera)

Examples:
  tallybar                          # Refresh every tenant
  tallybar tenants list             # Balances of all tenants
  tallybar analytics -p 30d         # Usage analytics for the selected tenant
  tallybar tokens --tenant work     # API tokens of one tenant
  tallybar daemon                   # Alerts and badge in the background
"#)]
#[command(version)]
#[command(author = "TallyBar Contributors")]
pub struct Cli {
    /// Subcommand to run. If none, runs 'refresh' by default.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Directory for persisted data (defaults to the platform data dir).
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Manage tenants.
    #[command(visible_alias = "t")]
    Tenants(tenants::TenantsArgs),

    /// Refresh balance, today's usage and tenant info (default).
    #[command(visible_alias = "r")]
    Refresh(refresh::RefreshArgs),

    /// Show usage analytics for a tenant.
    #[command(visible_alias = "a")]
    Analytics(analytics::AnalyticsArgs),

    /// List API tokens of a tenant.
    Tokens(tokens::TokensArgs),

    /// Manage daily usage alerts.
    Alert(alert::AlertArgs),

    /// Show or configure the balance badge.
    Badge(badge::BadgeArgs),

    /// Run usage alerts, the badge and the tenant watcher until Ctrl-C.
    Daemon(daemon::DaemonArgs),

    /// Manage configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// No tenant matched.
    TenantMissing = 2,
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let filter = if verbose {
        EnvFilter::new("tallybar=debug,info")
    } else {
        EnvFilter::new("tallybar=warn")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Some(Commands::Tenants(args)) => tenants::run(args, &cli).await,
        Some(Commands::Refresh(args)) => refresh::run(args, &cli).await,
        Some(Commands::Analytics(args)) => analytics::run(args, &cli).await,
        Some(Commands::Tokens(args)) => tokens::run(args, &cli).await,
        Some(Commands::Alert(args)) => alert::run(args, &cli).await,
        Some(Commands::Badge(args)) => badge::run(args, &cli).await,
        Some(Commands::Daemon(args)) => daemon::run(args, &cli).await,
        Some(Commands::Config(args)) => config::run(args, &cli),
        None => refresh::run(&refresh::RefreshArgs::default(), &cli).await,
    };

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e}");
        }
        let code = if e.is::<commands::TenantLookupError>() {
            ExitCode::TenantMissing
        } else {
            ExitCode::Error
        };
        std::process::exit(code as i32);
    }

    Ok(())
}
