//! Model lifecycle commands

use crate::client::ApiClient;
use crate::output::{print_info, print_json, print_success, print_warning, OutputFormat};
use anyhow::Result;
use colored::Colorize;
use risk_lib::{ModelMetadata, TrainRequest};

pub async fn status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status = client.model_status().await?;

    if format == OutputFormat::Json {
        return print_json(&status);
    }

    match &status.metadata {
        Some(metadata) if status.loaded => print_metadata(metadata),
        _ => print_warning("No trained model loaded; the service is using rule-based scoring"),
    }

    Ok(())
}

pub async fn train(client: &ApiClient, request: TrainRequest, format: OutputFormat) -> Result<()> {
    print_info("Training model...");
    let metadata = client.train(request).await?;
    report_trained(&metadata, format)
}

pub async fn retrain(client: &ApiClient, use_synthetic: bool, format: OutputFormat) -> Result<()> {
    print_info("Retraining model...");
    let metadata = client.retrain(use_synthetic).await?;
    report_trained(&metadata, format)
}

pub async fn rollback(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let response = client.rollback().await?;

    if format == OutputFormat::Json {
        return print_json(&response);
    }

    match &response.metadata {
        Some(metadata) if response.rolled_back => {
            print_success(&format!("Rolled back to {}", metadata.version));
            print_metadata(metadata);
        }
        _ => print_warning("No previous model version to roll back to"),
    }

    Ok(())
}

fn report_trained(metadata: &ModelMetadata, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(metadata);
    }
    print_success(&format!("Model {} trained", metadata.version));
    print_metadata(metadata);
    Ok(())
}

fn print_metadata(metadata: &ModelMetadata) {
    println!("{} {}", "Version:".bold(), metadata.version);
    println!(
        "{} {}",
        "Trained at:".bold(),
        metadata.trained_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "{} {} ({})",
        "Samples:".bold(),
        metadata.training_samples,
        metadata.data_origin
    );
    println!(
        "{} healthy {}, warning {}, critical {}",
        "Classes:".bold(),
        metadata.class_counts.healthy,
        metadata.class_counts.warning,
        metadata.class_counts.critical
    );
    println!("{} {:.3}", "Accuracy:".bold(), metadata.accuracy);
    println!("{} {:.2}", "RMSE:".bold(), metadata.rmse);
}
