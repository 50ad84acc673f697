//! Core data models for the risk engine

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Number of model input features: cpu, ram, disk, temperature, battery
pub const NUM_FEATURES: usize = 5;

/// Battery value fed to the model for devices without a battery ("always charged")
pub const NO_BATTERY_SENTINEL: f64 = 100.0;

/// Highest temperature (°C) accepted as a physical reading
pub const MAX_VALID_TEMPERATURE: f64 = 150.0;

/// A single metric sample reported by a device agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub device_id: String,
    pub timestamp: i64,
    pub cpu_usage: f64,
    pub ram_usage: f64,
    pub disk_usage: f64,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub battery_level: Option<f64>,
    #[serde(default)]
    pub network_in: u64,
    #[serde(default)]
    pub network_out: u64,
}

impl MetricSample {
    pub fn new(device_id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp,
            cpu_usage: 0.0,
            ram_usage: 0.0,
            disk_usage: 0.0,
            temperature: None,
            battery_level: None,
            network_in: 0,
            network_out: 0,
        }
    }

    pub fn with_usage(mut self, cpu: f64, ram: f64, disk: f64) -> Self {
        self.cpu_usage = cpu;
        self.ram_usage = ram;
        self.disk_usage = disk;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_battery(mut self, battery_level: f64) -> Self {
        self.battery_level = Some(battery_level);
        self
    }

    /// Enforce the physical-range invariants.
    ///
    /// Percentages are clamped into [0, 100]; non-finite percentages become 0.
    /// Temperature outside (0, 150] and non-finite battery readings become `None`.
    pub fn sanitized(mut self) -> Self {
        self.cpu_usage = clamp_percent(self.cpu_usage);
        self.ram_usage = clamp_percent(self.ram_usage);
        self.disk_usage = clamp_percent(self.disk_usage);
        self.temperature = valid_temperature(self.temperature);
        self.battery_level = valid_battery(self.battery_level);
        self
    }

    /// Value of a metric, `None` when the device did not report it
    pub fn value(&self, kind: MetricKind) -> Option<f64> {
        match kind {
            MetricKind::Cpu => Some(self.cpu_usage),
            MetricKind::Ram => Some(self.ram_usage),
            MetricKind::Disk => Some(self.disk_usage),
            MetricKind::Temperature => self.temperature,
            MetricKind::Battery => self.battery_level,
        }
    }

    /// Model input vector in fixed order
    pub fn features(&self) -> [f64; NUM_FEATURES] {
        encode_features(
            self.cpu_usage,
            self.ram_usage,
            self.disk_usage,
            self.temperature,
            self.battery_level,
        )
    }
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

fn valid_temperature(temperature: Option<f64>) -> Option<f64> {
    temperature.filter(|t| t.is_finite() && *t > 0.0 && *t <= MAX_VALID_TEMPERATURE)
}

fn valid_battery(battery: Option<f64>) -> Option<f64> {
    battery.filter(|b| b.is_finite()).map(|b| b.clamp(0.0, 100.0))
}

/// Build the `[cpu, ram, disk, temperature, battery]` model input.
///
/// Shared by training and inference so the missing-value convention is the
/// same on both sides: no temperature reads as 0, no battery reads as
/// [`NO_BATTERY_SENTINEL`].
pub fn encode_features(
    cpu: f64,
    ram: f64,
    disk: f64,
    temperature: Option<f64>,
    battery: Option<f64>,
) -> [f64; NUM_FEATURES] {
    [
        cpu,
        ram,
        disk,
        temperature.unwrap_or(0.0),
        battery.unwrap_or(NO_BATTERY_SENTINEL),
    ]
}

/// Metrics that contribute to the risk score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Cpu,
    Ram,
    Disk,
    Temperature,
    Battery,
}

impl MetricKind {
    pub const ALL: [MetricKind; 5] = [
        MetricKind::Cpu,
        MetricKind::Ram,
        MetricKind::Temperature,
        MetricKind::Disk,
        MetricKind::Battery,
    ];

    /// Metrics summarized by trend analysis
    pub const TRENDED: [MetricKind; 3] = [MetricKind::Cpu, MetricKind::Ram, MetricKind::Temperature];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Cpu => "cpu",
            MetricKind::Ram => "ram",
            MetricKind::Disk => "disk",
            MetricKind::Temperature => "temperature",
            MetricKind::Battery => "battery",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chronologically ordered, bounded history of samples for one device.
///
/// Samples are sanitized on the way in, so impossible readings in the
/// history count as missing just like in the current sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<MetricSample>", into = "Vec<MetricSample>")]
pub struct MetricWindow {
    samples: Vec<MetricSample>,
}

impl From<Vec<MetricSample>> for MetricWindow {
    fn from(samples: Vec<MetricSample>) -> Self {
        Self::new(samples)
    }
}

impl From<MetricWindow> for Vec<MetricSample> {
    fn from(window: MetricWindow) -> Self {
        window.samples
    }
}

impl MetricWindow {
    /// Build a window, ordering samples oldest-first
    pub fn new(samples: Vec<MetricSample>) -> Self {
        let mut samples: Vec<MetricSample> =
            samples.into_iter().map(MetricSample::sanitized).collect();
        samples.sort_by_key(|s| s.timestamp);
        Self { samples }
    }

    /// Build a window keeping only the most recent `max_len` samples
    pub fn bounded(samples: Vec<MetricSample>, max_len: usize) -> Self {
        let mut window = Self::new(samples);
        if window.samples.len() > max_len {
            window.samples.drain(0..window.samples.len() - max_len);
        }
        window
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[MetricSample] {
        &self.samples
    }

    /// Reported values of one metric, oldest first; unreported samples are skipped
    pub fn values(&self, kind: MetricKind) -> Vec<f64> {
        self.samples.iter().filter_map(|s| s.value(kind)).collect()
    }
}

/// Per-metric risk contributions, each in [0, 100]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskFactors(BTreeMap<MetricKind, f64>);

impl RiskFactors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, kind: MetricKind, risk: f64) {
        self.0.insert(kind, risk.clamp(0.0, 100.0));
    }

    /// Risk of a metric; a missing metric contributes nothing
    pub fn get(&self, kind: MetricKind) -> f64 {
        self.0.get(&kind).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricKind, f64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }
}

impl FromIterator<(MetricKind, f64)> for RiskFactors {
    fn from_iter<I: IntoIterator<Item = (MetricKind, f64)>>(iter: I) -> Self {
        let mut factors = RiskFactors::new();
        for (kind, risk) in iter {
            factors.set(kind, risk);
        }
        factors
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Warning,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            RiskLevel::Critical
        } else if score >= 50.0 {
            RiskLevel::Warning
        } else {
            RiskLevel::Low
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Warning => write!(f, "warning"),
            RiskLevel::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePrediction {
    Normal,
    FailurePossible,
    FailureLikely,
    FailureImminent,
}

impl fmt::Display for FailurePrediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePrediction::Normal => write!(f, "normal"),
            FailurePrediction::FailurePossible => write!(f, "failure_possible"),
            FailurePrediction::FailureLikely => write!(f, "failure_likely"),
            FailurePrediction::FailureImminent => write!(f, "failure_imminent"),
        }
    }
}

/// Time-to-failure bucket attached to a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeToFailure {
    #[serde(rename = "1-2 days")]
    OneToTwoDays,
    #[serde(rename = "2-4 days")]
    TwoToFourDays,
    #[serde(rename = "3-7 days")]
    ThreeToSevenDays,
    #[serde(rename = "1-2 weeks")]
    OneToTwoWeeks,
    #[serde(rename = "no failure expected")]
    NotExpected,
}

impl TimeToFailure {
    pub fn label(&self) -> &'static str {
        match self {
            TimeToFailure::OneToTwoDays => "1-2 days",
            TimeToFailure::TwoToFourDays => "2-4 days",
            TimeToFailure::ThreeToSevenDays => "3-7 days",
            TimeToFailure::OneToTwoWeeks => "1-2 weeks",
            TimeToFailure::NotExpected => "no failure expected",
        }
    }
}

impl fmt::Display for TimeToFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
    Volatile,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendDirection::Increasing => write!(f, "increasing"),
            TrendDirection::Decreasing => write!(f, "decreasing"),
            TrendDirection::Stable => write!(f, "stable"),
            TrendDirection::Volatile => write!(f, "volatile"),
        }
    }
}

/// Trend statistics for one metric over a window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricTrend {
    /// Normalized direction of change in [-1, 1]
    pub trend: f64,
    /// Coefficient of variation in [0, 1]
    pub volatility: f64,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub direction: TrendDirection,
    pub overall_trend: f64,
    pub cpu: MetricTrend,
    pub ram: MetricTrend,
    pub temperature: MetricTrend,
}

impl TrendSummary {
    pub fn metric(&self, kind: MetricKind) -> Option<&MetricTrend> {
        match kind {
            MetricKind::Cpu => Some(&self.cpu),
            MetricKind::Ram => Some(&self.ram),
            MetricKind::Temperature => Some(&self.temperature),
            MetricKind::Disk | MetricKind::Battery => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertSeverity::Warning => write!(f, "warning"),
            AlertSeverity::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub metric: MetricKind,
    pub severity: AlertSeverity,
    pub message: String,
    pub action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub actions: Vec<String>,
}

/// Which path produced a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    RuleBased,
    Ensemble,
    Ml,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::RuleBased => write!(f, "rule_based"),
            Provenance::Ensemble => write!(f, "ensemble"),
            Provenance::Ml => write!(f, "ml"),
        }
    }
}

/// Health class used as the classifier label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthClass {
    Healthy,
    Warning,
    Critical,
}

impl HealthClass {
    pub const COUNT: usize = 3;
    pub const ALL: [HealthClass; 3] = [HealthClass::Healthy, HealthClass::Warning, HealthClass::Critical];

    pub fn index(&self) -> usize {
        match self {
            HealthClass::Healthy => 0,
            HealthClass::Warning => 1,
            HealthClass::Critical => 2,
        }
    }

    pub fn from_index(index: usize) -> Self {
        match index {
            2 => HealthClass::Critical,
            1 => HealthClass::Warning,
            _ => HealthClass::Healthy,
        }
    }

    /// Same 50/80 cutoffs as the risk level
    pub fn from_risk(score: f64) -> Self {
        match RiskLevel::from_score(score) {
            RiskLevel::Critical => HealthClass::Critical,
            RiskLevel::Warning => HealthClass::Warning,
            RiskLevel::Low => HealthClass::Healthy,
        }
    }

    /// Map a stored device status to a class; unknown statuses count as healthy
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "critical" => HealthClass::Critical,
            "warning" => HealthClass::Warning,
            _ => HealthClass::Healthy,
        }
    }
}

impl fmt::Display for HealthClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthClass::Healthy => write!(f, "healthy"),
            HealthClass::Warning => write!(f, "warning"),
            HealthClass::Critical => write!(f, "critical"),
        }
    }
}

/// Per-class probabilities in percent
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassProbabilities {
    pub healthy: f64,
    pub warning: f64,
    pub critical: f64,
}

impl ClassProbabilities {
    /// Build from fractions indexed by [`HealthClass::index`]
    pub fn from_fractions(p: &[f64; HealthClass::COUNT]) -> Self {
        Self {
            healthy: p[0] * 100.0,
            warning: p[1] * 100.0,
            critical: p[2] * 100.0,
        }
    }
}

/// Model details attached to ensemble reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub version: String,
    pub accuracy: f64,
    pub rmse: f64,
    pub predicted_status: HealthClass,
    pub status_probabilities: ClassProbabilities,
}

/// Full risk assessment for one sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub device_id: String,
    pub generated_at: i64,
    pub total_risk: f64,
    pub risk_level: RiskLevel,
    pub failure_probability: f64,
    pub prediction: FailurePrediction,
    pub time_to_failure: TimeToFailure,
    pub alerts: Vec<Alert>,
    pub recommendations: Vec<Recommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend_analysis: Option<TrendSummary>,
    pub risk_factors: RiskFactors,
    pub provenance: Provenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelSummary>,
}

/// Historical (metric, status) row used for training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRow {
    pub cpu: f64,
    pub ram: f64,
    pub disk: f64,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub battery: Option<f64>,
    pub status_label: String,
}

impl TrainingRow {
    /// Same range rules as [`MetricSample::sanitized`]
    pub fn sanitized(mut self) -> Self {
        self.cpu = clamp_percent(self.cpu);
        self.ram = clamp_percent(self.ram);
        self.disk = clamp_percent(self.disk);
        self.temperature = valid_temperature(self.temperature);
        self.battery = valid_battery(self.battery);
        self
    }

    pub fn features(&self) -> [f64; NUM_FEATURES] {
        encode_features(self.cpu, self.ram, self.disk, self.temperature, self.battery)
    }

    pub fn label(&self) -> HealthClass {
        HealthClass::from_label(&self.status_label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_drops_impossible_temperature() {
        let sample = MetricSample::new("dev", 0)
            .with_usage(120.0, -5.0, f64::NAN)
            .with_temperature(180.0)
            .with_battery(140.0)
            .sanitized();

        assert_eq!(sample.cpu_usage, 100.0);
        assert_eq!(sample.ram_usage, 0.0);
        assert_eq!(sample.disk_usage, 0.0);
        assert_eq!(sample.temperature, None);
        assert_eq!(sample.battery_level, Some(100.0));

        let cold = MetricSample::new("dev", 0).with_temperature(0.0).sanitized();
        assert_eq!(cold.temperature, None);
    }

    #[test]
    fn test_feature_vector_uses_battery_sentinel() {
        let desktop = MetricSample::new("dev", 0).with_usage(10.0, 20.0, 30.0);
        assert_eq!(desktop.features(), [10.0, 20.0, 30.0, 0.0, NO_BATTERY_SENTINEL]);

        let row = TrainingRow {
            cpu: 10.0,
            ram: 20.0,
            disk: 30.0,
            temperature: None,
            battery: None,
            status_label: "online".to_string(),
        };
        assert_eq!(row.features(), desktop.features());
        assert_eq!(row.label(), HealthClass::Healthy);
    }

    #[test]
    fn test_window_orders_and_bounds_samples() {
        let samples = (0..10)
            .rev()
            .map(|i| MetricSample::new("dev", i).with_usage(i as f64, 0.0, 0.0))
            .collect();
        let window = MetricWindow::bounded(samples, 4);

        assert_eq!(window.len(), 4);
        assert_eq!(window.values(MetricKind::Cpu), vec![6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_window_drops_impossible_history() {
        let json = r#"[
            {"device_id": "dev", "timestamp": 2, "cpu_usage": 50, "ram_usage": 50, "disk_usage": 50, "temperature": 75},
            {"device_id": "dev", "timestamp": 1, "cpu_usage": 150, "ram_usage": 50, "disk_usage": 50, "temperature": 900}
        ]"#;
        let window: MetricWindow = serde_json::from_str(json).unwrap();

        assert_eq!(window.values(MetricKind::Temperature), vec![75.0]);
        assert_eq!(window.values(MetricKind::Cpu), vec![100.0, 50.0]);
        assert_eq!(window.samples()[0].timestamp, 1);
    }

    #[test]
    fn test_training_row_sanitized() {
        let row = TrainingRow {
            cpu: 140.0,
            ram: f64::NAN,
            disk: 30.0,
            temperature: Some(900.0),
            battery: Some(-10.0),
            status_label: "warning".to_string(),
        }
        .sanitized();

        assert_eq!(row.cpu, 100.0);
        assert_eq!(row.ram, 0.0);
        assert_eq!(row.temperature, None);
        assert_eq!(row.battery, Some(0.0));
    }

    #[test]
    fn test_risk_factors_missing_metric_is_zero() {
        let factors: RiskFactors = [(MetricKind::Cpu, 130.0)].into_iter().collect();
        assert_eq!(factors.get(MetricKind::Cpu), 100.0);
        assert_eq!(factors.get(MetricKind::Battery), 0.0);
    }

    #[test]
    fn test_report_enums_serialize_as_labels() {
        assert_eq!(serde_json::to_string(&TimeToFailure::OneToTwoWeeks).unwrap(), "\"1-2 weeks\"");
        assert_eq!(
            serde_json::to_string(&FailurePrediction::FailureImminent).unwrap(),
            "\"failure_imminent\""
        );
        assert_eq!(serde_json::to_string(&Provenance::RuleBased).unwrap(), "\"rule_based\"");
        assert_eq!(HealthClass::from_label(" Critical "), HealthClass::Critical);
    }
}
