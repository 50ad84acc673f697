//! Local rule-based scoring, no service required

use crate::client::ApiClient;
use crate::output::{print_json, print_report, OutputFormat};
use anyhow::{Context, Result};
use risk_lib::{MetricSample, MetricWindow, RiskReport, RuleBasedPredictor, ScoringConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ScoreArgs {
    pub device: String,
    pub cpu: f64,
    pub ram: f64,
    pub disk: f64,
    pub temperature: Option<f64>,
    pub battery: Option<f64>,
    pub window: Option<PathBuf>,
}

impl ScoreArgs {
    fn sample(&self) -> MetricSample {
        let mut sample = MetricSample::new(self.device.clone(), chrono::Utc::now().timestamp())
            .with_usage(self.cpu, self.ram, self.disk);
        sample.temperature = self.temperature;
        sample.battery_level = self.battery;
        sample
    }
}

/// Read a window file: a JSON array of samples
pub fn load_window(path: &Path) -> Result<MetricWindow> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read window file {:?}", path))?;
    let samples: Vec<MetricSample> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse window file {:?}", path))?;
    Ok(MetricWindow::new(samples))
}

pub fn evaluate(args: &ScoreArgs) -> Result<RiskReport> {
    let predictor = RuleBasedPredictor::new(Arc::new(ScoringConfig::default()));
    let window = args.window.as_deref().map(load_window).transpose()?;
    Ok(predictor.predict(&args.sample(), window.as_ref()))
}

pub fn run(args: ScoreArgs, format: OutputFormat) -> Result<()> {
    let report = evaluate(&args)?;
    render(&report, format)
}

/// Send the sample and window to the service's ensemble
pub async fn run_remote(client: &ApiClient, args: ScoreArgs, format: OutputFormat) -> Result<()> {
    let window = match args.window.as_deref() {
        Some(path) => load_window(path)?.samples().to_vec(),
        None => Vec::new(),
    };
    let report = client.assess(&args.sample(), &window).await?;
    render(&report, format)
}

fn render(report: &RiskReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(report)?,
        OutputFormat::Table => print_report(report),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use risk_lib::{MetricKind, Provenance, RiskLevel};
    use std::io::Write;

    fn args(cpu: f64, ram: f64, disk: f64) -> ScoreArgs {
        ScoreArgs {
            device: "local".to_string(),
            cpu,
            ram,
            disk,
            temperature: None,
            battery: None,
            window: None,
        }
    }

    #[test]
    fn test_idle_device_is_low_risk() {
        let report = evaluate(&args(10.0, 20.0, 30.0)).unwrap();
        assert_eq!(report.risk_level, RiskLevel::Low);
        assert_eq!(report.provenance, Provenance::RuleBased);
        assert_eq!(report.risk_factors.get(MetricKind::Temperature), 0.0);
        assert!(report.trend_analysis.is_none());
    }

    #[test]
    fn test_window_file_enables_trend() {
        let samples: Vec<MetricSample> = (0..5)
            .map(|i| {
                MetricSample::new("local", 1_700_000_000 + i)
                    .with_usage(40.0 + i as f64 * 10.0, 50.0, 50.0)
                    .with_temperature(50.0 + i as f64 * 5.0)
            })
            .collect();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&samples).unwrap().as_bytes())
            .unwrap();

        let mut score = args(85.0, 50.0, 50.0);
        score.temperature = Some(72.0);
        score.window = Some(file.path().to_path_buf());

        let report = evaluate(&score).unwrap();
        assert!(report.trend_analysis.is_some());
    }

    #[test]
    fn test_bad_window_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{not json").unwrap();

        let mut score = args(50.0, 50.0, 50.0);
        score.window = Some(file.path().to_path_buf());
        assert!(evaluate(&score).is_err());

        score.window = Some(PathBuf::from("/nonexistent/window.json"));
        assert!(evaluate(&score).is_err());
    }
}
