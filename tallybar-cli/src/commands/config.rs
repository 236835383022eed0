//! Config command - show configuration and paths.

use anyhow::Result;
use clap::{Args, Subcommand};
use tallybar_store::{Config, default_config_dir, default_config_path, default_data_dir};

use crate::output::JsonFormatter;
use crate::{Cli, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration.
    Show,

    /// Show configuration paths.
    Path,

    /// Write the current configuration (defaults filled in) to disk.
    Init,
}

/// Runs the config command.
pub fn run(args: &ConfigArgs, cli: &Cli) -> Result<()> {
    match &args.action {
        ConfigAction::Show => show_config(cli),
        ConfigAction::Path => show_paths(cli),
        ConfigAction::Init => init_config(cli),
    }
}

fn show_config(cli: &Cli) -> Result<()> {
    let config = Config::load()?;

    match cli.format {
        OutputFormat::Text => {
            let general = &config.general;
            let network = &config.network;

            println!("TallyBar Configuration");
            println!("{}", "─".repeat(40));
            println!();
            println!("Refresh interval:  {}s", general.refresh_interval_secs);
            println!("Alert interval:    {}s", general.alert_interval_secs);
            println!("Hydration timeout: {}s", general.hydration_timeout_secs);
            println!("Log level:         {}", general.log_level);
            println!();
            println!("Requests per second: {}", network.default_qps);
            let mut overrides: Vec<_> = network.qps_overrides.iter().collect();
            overrides.sort();
            for (host, qps) in overrides {
                println!("  {host}: {qps}");
            }
            println!("Request timeout:     {}s", network.timeout_secs);
            println!(
                "Retries:             {} ({}ms..{}ms)",
                network.max_retries, network.base_delay_ms, network.max_delay_ms
            );
            println!("Rate-limit cooldown: {}s", network.cooldown_secs);
            println!();
            println!("Analytics points:  {}", config.analytics.max_points);
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&config)?);
        }
    }

    Ok(())
}

fn show_paths(cli: &Cli) -> Result<()> {
    let config_dir = default_config_dir();
    let config_path = default_config_path();
    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration Paths");
            println!("{}", "─".repeat(40));
            println!();
            println!("Config dir:  {}", config_dir.display());
            println!("Config file: {}", config_path.display());
            println!("Data dir:    {}", data_dir.display());
        }
        OutputFormat::Json => {
            let paths = serde_json::json!({
                "config_dir": config_dir.display().to_string(),
                "config_file": config_path.display().to_string(),
                "data_dir": data_dir.display().to_string(),
            });
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&paths)?);
        }
    }

    Ok(())
}

fn init_config(cli: &Cli) -> Result<()> {
    let config = Config::load()?;
    config.save()?;

    if !cli.quiet {
        println!("Wrote {}", default_config_path().display());
    }
    Ok(())
}
