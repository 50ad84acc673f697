//! HTTP API: health, Prometheus metrics, model lifecycle and risk assessment

use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use risk_lib::{
    health::{Component, ComponentStatus, HealthRegistry},
    Assessment, DeviceMonitor, EngineError, EngineMetrics, EnsemblePredictor, MetricSample,
    MetricWindow, ModelMetadata, ModelStatus, ModelTrainer, RiskReport, TrainRequest,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: EngineMetrics,
    pub trainer: Arc<ModelTrainer>,
    pub monitor: Arc<DeviceMonitor>,
    pub predictor: Arc<EnsemblePredictor>,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        trainer: Arc<ModelTrainer>,
        monitor: Arc<DeviceMonitor>,
        predictor: Arc<EnsemblePredictor>,
    ) -> Self {
        Self {
            health_registry,
            metrics: EngineMetrics::new(),
            trainer,
            monitor,
            predictor,
        }
    }

    /// Reflect the installed model in the `model` health component
    pub async fn sync_model_health(&self) {
        if self.trainer.status().loaded {
            self.health_registry.set_healthy(Component::Model).await;
        } else {
            self.health_registry
                .set_degraded(Component::Model, "No trained model; serving rule-based predictions")
                .await;
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RetrainRequest {
    #[serde(default = "default_true")]
    pub use_synthetic: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackResponse {
    pub rolled_back: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ModelMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssessRequest {
    pub sample: MetricSample,
    /// Recent history, any order
    #[serde(default)]
    pub window: Vec<MetricSample>,
}

/// 200 while operational (degraded included), 503 when unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

async fn model_status(State(state): State<Arc<AppState>>) -> Json<ModelStatus> {
    Json(state.trainer.status())
}

async fn train(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TrainRequest>,
) -> ApiResult<Json<ModelMetadata>> {
    let result = state.trainer.train(request).await;
    finish_training(&state, result).await
}

async fn retrain(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RetrainRequest>,
) -> ApiResult<Json<ModelMetadata>> {
    let result = state.trainer.retrain(request.use_synthetic).await;
    finish_training(&state, result).await
}

async fn finish_training(
    state: &AppState,
    result: Result<ModelMetadata, EngineError>,
) -> ApiResult<Json<ModelMetadata>> {
    match result {
        Ok(metadata) => {
            state.health_registry.set_healthy(Component::Trainer).await;
            state.sync_model_health().await;
            Ok(Json(metadata))
        }
        Err(e) => {
            if !e.is_insufficient_data() {
                state
                    .health_registry
                    .set_degraded(Component::Trainer, e.to_string())
                    .await;
            }
            Err(e.into())
        }
    }
}

async fn rollback(State(state): State<Arc<AppState>>) -> ApiResult<Json<RollbackResponse>> {
    let metadata = state.trainer.rollback().await?;
    state.sync_model_health().await;
    Ok(Json(RollbackResponse {
        rolled_back: metadata.is_some(),
        metadata,
    }))
}

async fn device_risk(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
) -> ApiResult<Json<Assessment>> {
    match state.monitor.assess(&device_id).await {
        Ok(Some(assessment)) => {
            state.health_registry.set_healthy(Component::Source).await;
            Ok(Json(assessment))
        }
        Ok(None) => Err(ApiError::NotFound(format!("no samples for device {}", device_id))),
        Err(e) => {
            state
                .health_registry
                .set_degraded(Component::Source, e.to_string())
                .await;
            Err(e.into())
        }
    }
}

async fn assess(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AssessRequest>,
) -> ApiResult<Json<RiskReport>> {
    if request.sample.device_id.trim().is_empty() {
        return Err(ApiError::BadRequest("sample.device_id is required".to_string()));
    }
    let window = MetricWindow::new(request.window);
    let report = state.predictor.predict(&request.sample, Some(&window));
    state.metrics.inc_reports(report.provenance);
    Ok(Json(report))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/model/status", get(model_status))
        .route("/api/v1/model/train", post(train))
        .route("/api/v1/model/retrain", post(retrain))
        .route("/api/v1/model/rollback", post(rollback))
        .route("/api/v1/devices/:id/risk", get(device_risk))
        .route("/api/v1/assess", post(assess))
        .with_state(state)
}

pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
