//! drp: command-line client for the device risk engine

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::score::ScoreArgs;
use output::OutputFormat;
use risk_lib::TrainRequest;
use std::path::PathBuf;

/// CLI for the Device Risk Predictor
#[derive(Parser)]
#[command(name = "drp")]
#[command(author, version, about = "CLI for the Device Risk Predictor", long_about = None)]
pub struct Cli {
    /// Risk engine API URL (falls back to the config file, then http://localhost:8080)
    #[arg(long, env = "DRP_API_URL")]
    api_url: Option<String>,

    /// Output format
    #[arg(long, short, value_enum)]
    format: Option<OutputFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one sample with the rule-based predictor
    Score {
        /// CPU usage percent
        #[arg(long)]
        cpu: f64,

        /// RAM usage percent
        #[arg(long)]
        ram: f64,

        /// Disk usage percent
        #[arg(long)]
        disk: f64,

        /// Temperature in °C
        #[arg(long)]
        temperature: Option<f64>,

        /// Battery level percent
        #[arg(long)]
        battery: Option<f64>,

        /// Device identifier attached to the report
        #[arg(long, default_value = "local")]
        device: String,

        /// JSON file with an array of recent samples
        #[arg(long)]
        window: Option<PathBuf>,

        /// Score through the service's ensemble instead of locally
        #[arg(long)]
        remote: bool,
    },

    /// Assess a device's latest sample through the service
    Device {
        /// Device identifier
        id: String,
    },

    /// Model lifecycle operations
    #[command(subcommand)]
    Model(ModelCommands),
}

#[derive(Subcommand)]
enum ModelCommands {
    /// Show the installed model
    Status,

    /// Train a new model version
    Train {
        /// Fail instead of falling back to synthetic data
        #[arg(long)]
        no_synthetic: bool,

        /// Skip historical rows from the data source
        #[arg(long)]
        no_db: bool,
    },

    /// Retrain from history
    Retrain {
        /// Fail instead of falling back to synthetic data
        #[arg(long)]
        no_synthetic: bool,
    },

    /// Restore the previous model version
    Rollback,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::Config::load()?;
    let format = config.resolve_format(cli.format)?;
    let api_url = config.resolve_api_url(cli.api_url);

    match cli.command {
        Commands::Score {
            cpu,
            ram,
            disk,
            temperature,
            battery,
            device,
            window,
            remote,
        } => {
            let args = ScoreArgs {
                device,
                cpu,
                ram,
                disk,
                temperature,
                battery,
                window,
            };
            if remote {
                let client = client::ApiClient::new(&api_url)?;
                commands::score::run_remote(&client, args, format).await?;
            } else {
                commands::score::run(args, format)?;
            }
        }
        Commands::Device { id } => {
            let client = client::ApiClient::new(&api_url)?;
            commands::device::run(&client, &id, format).await?;
        }
        Commands::Model(cmd) => {
            let client = client::ApiClient::new(&api_url)?;
            match cmd {
                ModelCommands::Status => commands::model::status(&client, format).await?,
                ModelCommands::Train { no_synthetic, no_db } => {
                    let request = TrainRequest {
                        use_synthetic: !no_synthetic,
                        use_db: !no_db,
                    };
                    commands::model::train(&client, request, format).await?
                }
                ModelCommands::Retrain { no_synthetic } => {
                    commands::model::retrain(&client, !no_synthetic, format).await?
                }
                ModelCommands::Rollback => commands::model::rollback(&client, format).await?,
            }
        }
    }

    Ok(())
}
