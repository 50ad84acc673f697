//! Metrics data source
//!
//! The engine never talks to a datastore directly. It goes through
//! [`MetricsSource`], so the service can be pointed at any backend and
//! tests can run against [`MemorySource`].

use crate::error::{EngineError, Result};
use crate::models::{MetricSample, MetricWindow, TrainingRow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::info;

#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Most recent sample for a device, `None` if it never reported
    async fn fetch_latest_sample(&self, device_id: &str) -> Result<Option<MetricSample>>;

    /// Up to `limit` most recent samples, oldest first
    async fn fetch_recent_samples(&self, device_id: &str, limit: usize) -> Result<MetricWindow>;

    /// Up to `limit` most recent labelled rows across all devices
    async fn fetch_training_rows(&self, limit: usize) -> Result<Vec<TrainingRow>>;
}

/// Serialized form of a [`MemorySource`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSnapshot {
    pub samples: Vec<MetricSample>,
    pub training_rows: Vec<TrainingRow>,
}

/// In-process source backed by maps
#[derive(Debug, Default)]
pub struct MemorySource {
    samples: RwLock<HashMap<String, Vec<MetricSample>>>,
    /// Oldest first
    training_rows: RwLock<Vec<TrainingRow>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: SourceSnapshot) -> Self {
        let mut samples: HashMap<String, Vec<MetricSample>> = HashMap::new();
        for sample in snapshot.samples {
            samples.entry(sample.device_id.clone()).or_default().push(sample);
        }
        for device in samples.values_mut() {
            device.sort_by_key(|s| s.timestamp);
        }
        Self {
            samples: RwLock::new(samples),
            training_rows: RwLock::new(snapshot.training_rows),
        }
    }

    /// Load a `{ "samples": [...], "training_rows": [...] }` JSON file
    pub fn load_json(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| EngineError::Source(format!("failed to read {:?}: {}", path, e)))?;
        let snapshot: SourceSnapshot = serde_json::from_slice(&bytes)?;
        info!(
            path = %path.display(),
            samples = snapshot.samples.len(),
            training_rows = snapshot.training_rows.len(),
            "Loaded metrics snapshot"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    pub async fn push_sample(&self, sample: MetricSample) {
        let mut samples = self.samples.write().await;
        let device = samples.entry(sample.device_id.clone()).or_default();
        let pos = device.partition_point(|s| s.timestamp <= sample.timestamp);
        device.insert(pos, sample);
    }

    pub async fn push_training_row(&self, row: TrainingRow) {
        self.training_rows.write().await.push(row);
    }

    pub async fn device_count(&self) -> usize {
        self.samples.read().await.len()
    }
}

#[async_trait]
impl MetricsSource for MemorySource {
    async fn fetch_latest_sample(&self, device_id: &str) -> Result<Option<MetricSample>> {
        Ok(self
            .samples
            .read()
            .await
            .get(device_id)
            .and_then(|s| s.last().cloned()))
    }

    async fn fetch_recent_samples(&self, device_id: &str, limit: usize) -> Result<MetricWindow> {
        let samples = self
            .samples
            .read()
            .await
            .get(device_id)
            .cloned()
            .unwrap_or_default();
        Ok(MetricWindow::bounded(samples, limit))
    }

    async fn fetch_training_rows(&self, limit: usize) -> Result<Vec<TrainingRow>> {
        let rows = self.training_rows.read().await;
        Ok(rows.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample(device: &str, ts: i64, cpu: f64) -> MetricSample {
        MetricSample::new(device, ts).with_usage(cpu, 40.0, 50.0)
    }

    #[tokio::test]
    async fn test_latest_and_window() {
        let source = MemorySource::new();
        for (ts, cpu) in [(30, 30.0), (10, 10.0), (20, 20.0), (40, 40.0)] {
            source.push_sample(sample("dev-a", ts, cpu)).await;
        }
        source.push_sample(sample("dev-b", 5, 99.0)).await;

        let latest = source.fetch_latest_sample("dev-a").await.unwrap().unwrap();
        assert_eq!(latest.timestamp, 40);

        let window = source.fetch_recent_samples("dev-a", 3).await.unwrap();
        let stamps: Vec<i64> = window.samples().iter().map(|s| s.timestamp).collect();
        assert_eq!(stamps, vec![20, 30, 40]);

        assert!(source.fetch_latest_sample("missing").await.unwrap().is_none());
        assert!(source.fetch_recent_samples("missing", 10).await.unwrap().is_empty());
        assert_eq!(source.device_count().await, 2);
    }

    #[tokio::test]
    async fn test_training_rows_newest_first() {
        let source = MemorySource::new();
        for i in 0..5 {
            source
                .push_training_row(TrainingRow {
                    cpu: i as f64,
                    ram: 0.0,
                    disk: 0.0,
                    temperature: None,
                    battery: None,
                    status_label: "healthy".to_string(),
                })
                .await;
        }
        let rows = source.fetch_training_rows(2).await.unwrap();
        assert_eq!(rows.iter().map(|r| r.cpu).collect::<Vec<_>>(), vec![4.0, 3.0]);
    }

    #[tokio::test]
    async fn test_load_json_snapshot() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "samples": [
                    {{"device_id": "pc-1", "timestamp": 2, "cpu_usage": 50, "ram_usage": 60, "disk_usage": 70, "temperature": 55}},
                    {{"device_id": "pc-1", "timestamp": 1, "cpu_usage": 40, "ram_usage": 60, "disk_usage": 70}}
                ],
                "training_rows": [
                    {{"cpu": 90, "ram": 95, "disk": 97, "status_label": "critical"}}
                ]
            }}"#
        )
        .unwrap();

        let source = MemorySource::load_json(file.path()).unwrap();
        let latest = source.fetch_latest_sample("pc-1").await.unwrap().unwrap();
        assert_eq!(latest.temperature, Some(55.0));
        assert_eq!(source.fetch_training_rows(100).await.unwrap().len(), 1);
    }

    #[test]
    fn test_load_missing_file_is_source_error() {
        let err = MemorySource::load_json(Path::new("/nonexistent/snapshot.json")).unwrap_err();
        assert!(matches!(err, EngineError::Source(_)));
    }
}
