//! callroute CLI
//!
//! Runs call audio scenarios against simulated collaborators and manages the
//! configuration file.

mod script;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use callroute_core::domain::{CallRouteConfig, Capabilities, CapabilityProbe, ConfigManager};

use script::{Runner, Step};

#[derive(Parser)]
#[command(name = "callroute")]
#[command(about = "Call audio route arbitration", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a scenario script
    Run {
        script: PathBuf,

        /// Print steps as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the host capabilities used for routing
    Devices {
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config {
        /// Write it to the configuration file instead
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref()).await?;

    match cli.command {
        Command::Run { script, json } => run_script(&script, &config, json).await,
        Command::Devices { json } => show_devices(&config, json),
        Command::Config { write } => {
            if write {
                let path = match cli.config {
                    Some(path) => path,
                    None => ConfigManager::new(ConfigManager::default_config_dir()?)
                        .config_path()
                        .to_path_buf(),
                };
                config.save_to_file(&path).await?;
                println!("Wrote {}", path.display());
            } else {
                print!("{}", toml::to_string_pretty(&config)?);
            }
            Ok(())
        }
    }
}

async fn load_config(path: Option<&Path>) -> anyhow::Result<CallRouteConfig> {
    if let Some(path) = path {
        return CallRouteConfig::load_from_file(path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display()));
    }

    match ConfigManager::default_config_dir() {
        Ok(dir) => Ok(ConfigManager::new(dir).load().await),
        Err(e) => {
            warn!(error = %e, "No config directory, using defaults");
            Ok(CallRouteConfig::default())
        }
    }
}

#[cfg(feature = "cpal-probe")]
fn host_probe() -> Box<dyn CapabilityProbe> {
    Box::new(callroute_infra::platform::CpalProbe::default())
}

#[cfg(not(feature = "cpal-probe"))]
fn host_probe() -> Box<dyn CapabilityProbe> {
    Box::new(Capabilities::PHONE)
}

fn capabilities(config: &CallRouteConfig) -> Capabilities {
    config.capabilities.resolve(host_probe().as_ref())
}

async fn run_script(path: &Path, config: &CallRouteConfig, json: bool) -> anyhow::Result<()> {
    let source = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read script {}", path.display()))?;
    let commands = script::parse(&source)
        .with_context(|| format!("Invalid script {}", path.display()))?;

    info!(script = %path.display(), steps = commands.len(), "Running scenario");
    let mut runner = Runner::new(config, capabilities(config));
    let steps = runner.run(&commands);

    if json {
        println!("{}", serde_json::to_string_pretty(&steps)?);
    } else {
        for step in &steps {
            print_step(step);
        }
    }

    let failed = steps.iter().filter(|s| s.error.is_some()).count();
    if failed > 0 {
        info!(failed, "Scenario finished with rejected steps");
    }
    Ok(())
}

fn print_step(step: &Step) {
    println!("{:>3}  {}", step.line, step.command);
    if let Some(error) = &step.error {
        println!("       error: {}", error);
    }
    for change in &step.changes {
        let selected = change
            .selected
            .as_ref()
            .map_or_else(|| "none".to_string(), |d| d.to_string());
        let available: Vec<String> = change.available.iter().map(|d| d.label.clone()).collect();
        println!("       route: {} [{}]", selected, available.join(", "));
    }
    if step.command == "status" {
        let snapshot = &step.snapshot;
        let selected = snapshot
            .selected
            .as_ref()
            .map_or_else(|| "none".to_string(), |d| d.to_string());
        println!(
            "       {} | selected {} | bluetooth {} | {} device(s)",
            snapshot.state,
            selected,
            snapshot.bluetooth,
            snapshot.available.len()
        );
    }
}

fn show_devices(config: &CallRouteConfig, json: bool) -> anyhow::Result<()> {
    let capabilities = capabilities(config);
    if json {
        println!("{}", serde_json::to_string_pretty(&capabilities)?);
    } else {
        println!("earpiece:     {}", capabilities.has_earpiece);
        println!("speakerphone: {}", capabilities.has_speakerphone);
    }
    Ok(())
}
