//! Risk engine - device risk scoring and failure prediction service
//!
//! Serves rule-based and model-blended risk reports per device, and
//! trains, persists and hot-swaps the failure model on request.

use anyhow::{Context, Result};
use risk_engine::{api, config::EngineConfig};
use risk_lib::{
    health::{Component, HealthRegistry},
    AlertDeduplicator, ConfigHandle, DeviceMonitor, EnsemblePredictor, MemorySource,
    MetricsSource, ModelPredictor, ModelStore, ModelTrainer, StructuredLogger, TrainRequest,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting risk-engine");

    let config = EngineConfig::load()?;
    info!(
        instance = %config.instance_name,
        model_dir = %config.model_dir.display(),
        "Engine configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(Component::Predictor).await;
    health_registry.register(Component::Source).await;
    health_registry.register(Component::Trainer).await;

    let logger = StructuredLogger::new(&config.instance_name);

    let source: Arc<dyn MetricsSource> = match &config.data_file {
        Some(path) => Arc::new(
            MemorySource::load_json(path)
                .with_context(|| format!("Failed to load data file {:?}", path))?,
        ),
        None => {
            warn!("No data_file configured; device queries will find no samples");
            Arc::new(MemorySource::new())
        }
    };

    let store = Arc::new(
        ModelStore::new(&config.model_dir, config.versions_to_keep)
            .context("Failed to open model store")?,
    );
    let model = Arc::new(ModelPredictor::load_from(&store));
    if let Some(metadata) = model.metadata() {
        logger.log_model_loaded(&metadata);
    }

    let scoring = ConfigHandle::new(config.scoring.clone()).context("Invalid scoring configuration")?;
    let predictor = Arc::new(EnsemblePredictor::new(
        scoring,
        Arc::clone(&model),
        logger.clone(),
    ));

    let trainer = Arc::new(ModelTrainer::new(
        config.trainer.clone(),
        Arc::clone(&source),
        store,
        Arc::clone(&model),
        logger.clone(),
    )?);

    let monitor = Arc::new(
        DeviceMonitor::new(
            source,
            predictor.clone(),
            AlertDeduplicator::new(Duration::from_secs(config.alert_dedup_secs)),
            logger.clone(),
        )
        .with_window_size(config.window_size),
    );

    if !model.is_loaded() && config.train_on_startup {
        if let Err(e) = trainer.train(TrainRequest::default()).await {
            error!(error = %e, "Startup training failed; serving rule-based predictions");
        }
    }

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        trainer,
        monitor,
        predictor,
    ));
    app_state.sync_model_health().await;

    health_registry.set_ready(true).await;
    let model_version = model.metadata().map(|m| m.version);
    logger.log_startup(ENGINE_VERSION, model_version.as_deref());

    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::select! {
        result = api_handle => {
            match result {
                Ok(Ok(())) => logger.log_shutdown("API server stopped"),
                Ok(Err(e)) => {
                    logger.log_shutdown("API server failed");
                    return Err(e);
                }
                Err(e) => {
                    logger.log_shutdown("API task panicked");
                    return Err(e.into());
                }
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            logger.log_shutdown("SIGINT received");
        }
    }

    info!("Shutting down");
    Ok(())
}
