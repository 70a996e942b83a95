//! paramap CLI
//!
//! Inspects the weight mappings paramap builds for a model family: which
//! source tensors feed each destination parameter and how quantization
//! rewrites them.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use paramap_common::ConversionConfig;
use std::path::PathBuf;
use tracing::debug;

mod commands;

use commands::{MapCommand, list_models, list_quantizations};

/// paramap - parameter mapping for model weight conversion
#[derive(Parser)]
#[command(name = "paramap")]
#[command(about = "Map checkpoint tensors onto model parameters")]
#[command(long_about = r#"
paramap builds the name mapping between a source checkpoint and a model
definition, optionally rewriting the parameters for a quantization preset.

Examples:
  # List supported model families
  paramap models

  # List quantization presets
  paramap quantizations

  # Show the mapping for a Phi-3 vision checkpoint
  paramap map --model-type phiva --model-config config.json --quantization q4f16_1

  # Same mapping as JSON, from an AWQ checkpoint
  paramap map --model-config config.json --source awq --quantization q4f16_awq --output-format json
"#)]
#[command(version)]
struct Cli {
    /// Configuration file path (.toml or .json)
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered model families
    Models,

    /// List quantization presets
    #[command(alias = "quants")]
    Quantizations,

    /// Build and print the mapping for one checkpoint
    Map(MapCommand),

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        for cause in e.chain().skip(1) {
            eprintln!("  Caused by: {cause}");
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = ConversionConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
        config.validate().context("Invalid --log-level")?;
    }
    setup_logging(&config);
    debug!(?config, "effective configuration");

    match cli.command {
        Some(Commands::Models) => list_models(),
        Some(Commands::Quantizations) => list_quantizations(),
        Some(Commands::Map(cmd)) => cmd.execute(&config),
        Some(Commands::Config { action: ConfigAction::Show }) => {
            let rendered = toml::to_string_pretty(&config).context("Failed to serialize configuration")?;
            print!("{rendered}");
            Ok(())
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}

/// Logs go to stderr so reports on stdout stay machine readable
fn setup_logging(config: &ConversionConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match config.logging.format.as_str() {
        "json" => subscriber.json().init(),
        "pretty" => subscriber.pretty().init(),
        _ => subscriber.compact().init(),
    }
}
