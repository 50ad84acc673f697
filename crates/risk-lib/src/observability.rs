//! Observability for the risk engine
//!
//! Provides:
//! - Prometheus metrics (prediction and training latency, reports, alerts, model state)
//! - Structured JSON logging events with tracing

use crate::models::{AlertSeverity, Provenance, RiskReport};
use crate::training::ModelMetadata;
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, Gauge, Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for per-prediction latency (seconds)
const PREDICTION_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
];

/// Histogram buckets for training runs (seconds)
const TRAINING_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0];

/// Global metrics instance (registered once; `None` if registration failed)
static GLOBAL_METRICS: OnceLock<Option<EngineMetricsInner>> = OnceLock::new();

struct EngineMetricsInner {
    prediction_latency_seconds: Histogram,
    training_duration_seconds: Histogram,
    reports_total: IntCounterVec,
    alerts_total: IntCounterVec,
    model_fallbacks_total: IntCounter,
    training_runs_total: IntCounterVec,
    model_loaded: IntGauge,
    model_accuracy: Gauge,
    model_rmse: Gauge,
}

impl EngineMetricsInner {
    fn register() -> prometheus::Result<Self> {
        Ok(Self {
            prediction_latency_seconds: register_histogram!(
                "risk_engine_prediction_latency_seconds",
                "Time spent producing one risk report",
                PREDICTION_BUCKETS.to_vec()
            )?,
            training_duration_seconds: register_histogram!(
                "risk_engine_training_duration_seconds",
                "Wall time of a training run",
                TRAINING_BUCKETS.to_vec()
            )?,
            reports_total: register_int_counter_vec!(
                "risk_engine_reports_total",
                "Risk reports produced, by provenance",
                &["provenance"]
            )?,
            alerts_total: register_int_counter_vec!(
                "risk_engine_alerts_total",
                "New (deduplicated) alerts raised, by severity",
                &["severity"]
            )?,
            model_fallbacks_total: register_int_counter!(
                "risk_engine_model_fallbacks_total",
                "Predictions served rule-based because no model was usable"
            )?,
            training_runs_total: register_int_counter_vec!(
                "risk_engine_training_runs_total",
                "Training runs, by outcome",
                &["outcome"]
            )?,
            model_loaded: register_int_gauge!(
                "risk_engine_model_loaded",
                "1 when a trained model is installed"
            )?,
            model_accuracy: register_gauge!(
                "risk_engine_model_accuracy",
                "Held-out accuracy of the installed classifier"
            )?,
            model_rmse: register_gauge!(
                "risk_engine_model_rmse",
                "Held-out RMSE of the installed risk regressor"
            )?,
        })
    }
}

/// Engine metrics for Prometheus exposition
///
/// A lightweight handle to the process-wide metrics; clones share them.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(|| match EngineMetricsInner::register() {
            Ok(inner) => Some(inner),
            Err(e) => {
                warn!(error = %e, "Failed to register metrics, continuing without them");
                None
            }
        });
        Self { _private: () }
    }

    fn inner(&self) -> Option<&EngineMetricsInner> {
        GLOBAL_METRICS.get().and_then(Option::as_ref)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        if let Some(m) = self.inner() {
            m.prediction_latency_seconds.observe(duration_secs);
        }
    }

    pub fn inc_reports(&self, provenance: Provenance) {
        if let Some(m) = self.inner() {
            let label = provenance.to_string();
            m.reports_total.with_label_values(&[label.as_str()]).inc();
        }
    }

    pub fn inc_alerts(&self, severity: AlertSeverity) {
        if let Some(m) = self.inner() {
            let label = severity.to_string();
            m.alerts_total.with_label_values(&[label.as_str()]).inc();
        }
    }

    pub fn inc_model_fallbacks(&self) {
        if let Some(m) = self.inner() {
            m.model_fallbacks_total.inc();
        }
    }

    /// Record a finished training run; `outcome` is `success`,
    /// `insufficient_data` or `failed`
    pub fn record_training(&self, outcome: &str, duration_secs: f64) {
        if let Some(m) = self.inner() {
            m.training_runs_total.with_label_values(&[outcome]).inc();
            m.training_duration_seconds.observe(duration_secs);
        }
    }

    /// Reflect the installed model, or its absence
    pub fn set_model(&self, metadata: Option<&ModelMetadata>) {
        if let Some(m) = self.inner() {
            match metadata {
                Some(meta) => {
                    m.model_loaded.set(1);
                    m.model_accuracy.set(meta.accuracy);
                    m.model_rmse.set(meta.rmse);
                }
                None => {
                    m.model_loaded.set(0);
                    m.model_accuracy.set(0.0);
                    m.model_rmse.set(0.0);
                }
            }
        }
    }
}

/// Structured logger for engine events
///
/// Keeps event names and field sets consistent across the service.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_assessment(&self, report: &RiskReport, latency_secs: f64) {
        info!(
            event = "risk_assessed",
            instance = %self.instance,
            device_id = %report.device_id,
            total_risk = report.total_risk,
            risk_level = %report.risk_level,
            failure_probability = report.failure_probability,
            prediction = %report.prediction,
            provenance = %report.provenance,
            alerts = report.alerts.len(),
            latency_secs = latency_secs,
            "Device risk assessed"
        );
    }

    pub fn log_alert(&self, device_id: &str, metric: &str, severity: AlertSeverity, message: &str) {
        match severity {
            AlertSeverity::Critical => warn!(
                event = "alert_raised",
                instance = %self.instance,
                device_id = %device_id,
                metric = %metric,
                severity = %severity,
                message = %message,
                "Critical device alert"
            ),
            AlertSeverity::Warning => info!(
                event = "alert_raised",
                instance = %self.instance,
                device_id = %device_id,
                metric = %metric,
                severity = %severity,
                message = %message,
                "Device alert"
            ),
        }
    }

    pub fn log_model_fallback(&self, device_id: &str, reason: &str) {
        info!(
            event = "model_fallback",
            instance = %self.instance,
            device_id = %device_id,
            reason = %reason,
            "Serving rule-based report"
        );
    }

    pub fn log_training_started(&self, use_synthetic: bool, use_db: bool) {
        info!(
            event = "training_started",
            instance = %self.instance,
            use_synthetic = use_synthetic,
            use_db = use_db,
            "Model training started"
        );
    }

    pub fn log_training_completed(&self, metadata: &ModelMetadata, duration_secs: f64) {
        info!(
            event = "training_completed",
            instance = %self.instance,
            version = %metadata.version,
            samples = metadata.training_samples,
            accuracy = metadata.accuracy,
            rmse = metadata.rmse,
            origin = %metadata.data_origin,
            duration_secs = duration_secs,
            "Model training completed"
        );
    }

    pub fn log_training_failed(&self, reason: &str, insufficient_data: bool) {
        if insufficient_data {
            warn!(
                event = "training_failed",
                instance = %self.instance,
                reason = %reason,
                insufficient_data = true,
                "Not enough data to train, keeping current model"
            );
        } else {
            error!(
                event = "training_failed",
                instance = %self.instance,
                reason = %reason,
                insufficient_data = false,
                "Model training failed, keeping current model"
            );
        }
    }

    pub fn log_model_loaded(&self, metadata: &ModelMetadata) {
        info!(
            event = "model_loaded",
            instance = %self.instance,
            version = %metadata.version,
            trained_at = %metadata.trained_at,
            accuracy = metadata.accuracy,
            "Model installed"
        );
    }

    pub fn log_startup(&self, version: &str, model_version: Option<&str>) {
        info!(
            event = "engine_started",
            instance = %self.instance,
            engine_version = %version,
            model_version = %model_version.unwrap_or("none"),
            "Risk engine started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "engine_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Risk engine shutting down"
        );
    }
}
