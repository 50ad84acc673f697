//! Per-device assessment
//!
//! Pulls the latest sample and recent history from the source, runs the
//! predictor, and separates new alerts from ones already raised.

use crate::alerts::AlertDeduplicator;
use crate::error::Result;
use crate::models::{Alert, RiskReport};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::predictor::RiskPredictor;
use crate::source::MetricsSource;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Default number of historical samples fed to trend analysis
pub const DEFAULT_WINDOW_SIZE: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub report: RiskReport,
    /// Alerts not already raised for this device within the dedup window
    pub new_alerts: Vec<Alert>,
}

pub struct DeviceMonitor {
    source: Arc<dyn MetricsSource>,
    predictor: Arc<dyn RiskPredictor>,
    dedup: AlertDeduplicator,
    window_size: usize,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl DeviceMonitor {
    pub fn new(
        source: Arc<dyn MetricsSource>,
        predictor: Arc<dyn RiskPredictor>,
        dedup: AlertDeduplicator,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            source,
            predictor,
            dedup,
            window_size: DEFAULT_WINDOW_SIZE,
            metrics: EngineMetrics::new(),
            logger,
        }
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size.max(1);
        self
    }

    pub fn predictor(&self) -> &Arc<dyn RiskPredictor> {
        &self.predictor
    }

    /// Assess one device; `None` when it has no samples
    pub async fn assess(&self, device_id: &str) -> Result<Option<Assessment>> {
        let Some(latest) = self.source.fetch_latest_sample(device_id).await? else {
            return Ok(None);
        };
        let window = self
            .source
            .fetch_recent_samples(device_id, self.window_size)
            .await?;

        let started = Instant::now();
        let report = self.predictor.predict(&latest, Some(&window));
        let latency = started.elapsed().as_secs_f64();

        self.metrics.observe_prediction_latency(latency);
        self.metrics.inc_reports(report.provenance);
        self.logger.log_assessment(&report, latency);

        let new_alerts = self.dedup.filter_new(device_id, &report.alerts);
        for alert in &new_alerts {
            self.metrics.inc_alerts(alert.severity);
            self.logger
                .log_alert(device_id, alert.metric.as_str(), alert.severity, &alert.message);
        }

        Ok(Some(Assessment { report, new_alerts }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigHandle;
    use crate::models::{MetricSample, Provenance};
    use crate::predictor::{EnsemblePredictor, ModelPredictor};
    use crate::source::MemorySource;

    async fn monitor_with(samples: Vec<MetricSample>) -> DeviceMonitor {
        let source = Arc::new(MemorySource::new());
        for sample in samples {
            source.push_sample(sample).await;
        }
        let predictor = Arc::new(EnsemblePredictor::new(
            ConfigHandle::default(),
            Arc::new(ModelPredictor::new_without_model()),
            StructuredLogger::new("test"),
        ));
        DeviceMonitor::new(
            source,
            predictor,
            AlertDeduplicator::default(),
            StructuredLogger::new("test"),
        )
    }

    fn hot(ts: i64) -> MetricSample {
        MetricSample::new("laptop-7", ts)
            .with_usage(60.0 + ts as f64, 80.0, 96.0)
            .with_temperature(75.0)
            .with_battery(12.0)
    }

    #[tokio::test]
    async fn test_unknown_device_has_no_assessment() {
        let monitor = monitor_with(vec![]).await;
        assert!(monitor.assess("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_assessment_uses_history_and_dedups_alerts() {
        let monitor = monitor_with((0..6).map(hot).collect()).await;

        let first = monitor.assess("laptop-7").await.unwrap().unwrap();
        assert_eq!(first.report.device_id, "laptop-7");
        assert_eq!(first.report.provenance, Provenance::RuleBased);
        assert!(first.report.trend_analysis.is_some());
        assert!(!first.report.alerts.is_empty());
        assert_eq!(first.new_alerts, first.report.alerts);

        let second = monitor.assess("laptop-7").await.unwrap().unwrap();
        assert_eq!(second.report.alerts.len(), first.report.alerts.len());
        assert!(second.new_alerts.is_empty());
    }
}
