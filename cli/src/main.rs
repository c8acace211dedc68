// nearscan: command-line driver for the permission-gated scan core
//
// Runs scripted scan scenarios against simulated platform adapters and manages
// the scan settings file.

mod config;
mod simulate;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use simulate::{EnableAnswer, RadioStart, Scenario};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "nearscan")]
#[command(about = "nearscan: permission-gated nearby device discovery", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted scan scenario
    Simulate {
        /// Platform API level (defaults to the configured one)
        #[arg(long)]
        api_level: Option<u32>,
        /// Number of denied permission requests before granting
        #[arg(long, default_value = "0")]
        denials: u32,
        /// Also deny the location group
        #[arg(long)]
        deny_location: bool,
        /// Radio state at start
        #[arg(long, value_enum, default_value = "on")]
        radio: RadioStart,
        /// Answer to the radio enable request
        #[arg(long, value_enum, default_value = "accept")]
        enable: EnableAnswer,
        /// Comma-separated sightings, `ADDRESS` or `ADDRESS=Name`
        #[arg(long, value_delimiter = ',')]
        devices: Vec<String>,
        /// How long to collect sightings, in milliseconds
        #[arg(long)]
        duration_ms: Option<u64>,
    },
    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Set { key: String, value: String },
    Get { key: String },
    List,
    /// Print the config file location
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Simulate {
            api_level,
            denials,
            deny_location,
            radio,
            enable,
            devices,
            duration_ms,
        } => {
            let config = config::Config::load()?;
            let mut settings = config.scan.clone();
            if let Some(api_level) = api_level {
                settings.api_level = api_level;
            }
            settings.validate()?;

            let scenario = Scenario {
                denials,
                deny_location,
                radio,
                enable,
                sightings: devices,
                scan_duration: Duration::from_millis(
                    duration_ms.unwrap_or(config.simulate.scan_duration_ms),
                ),
                max_rounds: config.simulate.max_rounds,
            };
            cmd_simulate(settings, scenario).await
        }
        Commands::Config { action } => cmd_config(action),
    }
}

async fn cmd_simulate(settings: nearscan_core::ScanSettings, scenario: Scenario) -> Result<()> {
    println!("{}", "Starting nearby scan...".bold());
    println!();

    simulate::run(settings, scenario).await?;
    Ok(())
}

fn cmd_config(action: ConfigAction) -> Result<()> {
    let mut config = config::Config::load()?;

    match action {
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            config.save()?;
            println!("{} Set {} = {}", "✓".green(), key.bright_cyan(), value);
        }

        ConfigAction::Get { key } => {
            if let Some(value) = config.get(&key) {
                println!("{} = {}", key.bright_cyan(), value);
            } else {
                anyhow::bail!("Unknown config key: {}", key);
            }
        }

        ConfigAction::List => {
            println!("{}", "Configuration".bold());
            println!();

            for (key, value) in config.list() {
                println!("  {:<24} {}", key.bright_cyan(), value);
            }
        }

        ConfigAction::Path => {
            println!("{}", config::Config::config_file()?.display());
        }
    }

    Ok(())
}
