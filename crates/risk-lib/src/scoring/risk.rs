//! Deterministic multi-factor risk scoring
//!
//! Each metric is mapped to a risk in [0, 100] against its warning and
//! critical thresholds, optionally adjusted by the recent trend and
//! volatility of that metric. The combined score is a weighted sum plus
//! penalties for dangerous metric combinations.

use super::trend::TrendAnalyzer;
use crate::config::{MetricThreshold, ScoringConfig};
use crate::models::{MetricKind, MetricSample, MetricWindow, RiskFactors};

/// Samples needed before the volatility adjustment applies
const MIN_VOLATILITY_SAMPLES: usize = 4;

/// Volatility above which a metric gets the flat volatility penalty
const VOLATILITY_THRESHOLD: f64 = 0.3;

const RISING_TREND_GAIN: f64 = 20.0;
const FALLING_TREND_GAIN: f64 = 10.0;
const VOLATILITY_PENALTY: f64 = 10.0;

/// Combined risk with its per-metric breakdown
#[derive(Debug, Clone, PartialEq)]
pub struct RiskBreakdown {
    pub total: f64,
    pub factors: RiskFactors,
}

/// Scores samples against a configuration snapshot
#[derive(Debug, Clone)]
pub struct RiskScorer<'a> {
    config: &'a ScoringConfig,
    analyzer: TrendAnalyzer,
}

impl<'a> RiskScorer<'a> {
    pub fn new(config: &'a ScoringConfig) -> Self {
        Self {
            config,
            analyzer: TrendAnalyzer::new(),
        }
    }

    /// Risk of one rising metric (higher value is worse)
    pub fn component_risk(
        &self,
        value: f64,
        threshold: MetricThreshold,
        window: Option<&MetricWindow>,
        kind: MetricKind,
    ) -> f64 {
        let base = threshold_risk(value, threshold);
        self.adjust_for_history(base, window, kind)
    }

    /// Risk of the battery level (lower value is worse)
    pub fn battery_risk(&self, level: f64) -> f64 {
        battery_threshold_risk(level, self.config.thresholds.battery)
    }

    /// Per-metric risk factors for a sample; unreported metrics score 0
    pub fn risk_factors(&self, sample: &MetricSample, window: Option<&MetricWindow>) -> RiskFactors {
        let thresholds = &self.config.thresholds;
        let mut factors = RiskFactors::new();

        for kind in [MetricKind::Cpu, MetricKind::Ram, MetricKind::Temperature, MetricKind::Disk] {
            let risk = sample
                .value(kind)
                .map(|v| self.component_risk(v, thresholds.for_metric(kind), window, kind))
                .unwrap_or(0.0);
            factors.set(kind, risk);
        }

        let battery = sample.battery_level.map(|b| self.battery_risk(b)).unwrap_or(0.0);
        factors.set(MetricKind::Battery, battery);

        factors
    }

    /// Weighted sum of factors plus interaction penalties, clamped to [0, 100]
    pub fn weighted_risk(&self, factors: &RiskFactors) -> f64 {
        let weights = &self.config.weights;
        let base: f64 = MetricKind::ALL
            .iter()
            .map(|k| factors.get(*k) * weights.for_metric(*k))
            .sum();
        (base + interaction_penalty(factors)).clamp(0.0, 100.0)
    }

    /// Factors and combined score in one pass
    pub fn score(&self, sample: &MetricSample, window: Option<&MetricWindow>) -> RiskBreakdown {
        let factors = self.risk_factors(sample, window);
        RiskBreakdown {
            total: self.weighted_risk(&factors),
            factors,
        }
    }

    fn adjust_for_history(&self, base: f64, window: Option<&MetricWindow>, kind: MetricKind) -> f64 {
        let mut risk = base.clamp(0.0, 100.0);
        let window = match window {
            Some(w) => w,
            None => return risk,
        };

        if window.len() >= 2 {
            let trend = self.analyzer.trend(window, kind);
            // Rising trends compound risk; falling ones only partially discount it
            if trend > 0.0 {
                risk = (risk + trend * RISING_TREND_GAIN).clamp(0.0, 100.0);
            } else if trend < 0.0 {
                risk = (risk + trend * FALLING_TREND_GAIN).clamp(0.0, 100.0);
            }
        }

        if window.len() >= MIN_VOLATILITY_SAMPLES
            && self.analyzer.volatility(window, kind) > VOLATILITY_THRESHOLD
        {
            risk = (risk + VOLATILITY_PENALTY).clamp(0.0, 100.0);
        }

        risk
    }
}

/// Piecewise-linear risk for a metric where higher values are worse
pub fn threshold_risk(value: f64, threshold: MetricThreshold) -> f64 {
    let MetricThreshold { warning, critical } = threshold;
    let risk = if value > critical {
        100.0
    } else if value > warning {
        50.0 + ((value - warning) / (critical - warning)) * 50.0
    } else if warning > 0.0 {
        (value / warning) * 50.0
    } else {
        0.0
    };
    risk.clamp(0.0, 100.0)
}

/// Piecewise-linear risk for the battery, where lower values are worse
pub fn battery_threshold_risk(level: f64, threshold: MetricThreshold) -> f64 {
    let MetricThreshold { warning, critical } = threshold;
    let risk = if level < critical {
        100.0
    } else if level < warning {
        50.0 + ((warning - level) / (warning - critical)) * 50.0
    } else {
        (100.0 - level) / 75.0 * 50.0
    };
    risk.clamp(0.0, 100.0)
}

fn interaction_penalty(factors: &RiskFactors) -> f64 {
    let cpu = factors.get(MetricKind::Cpu);
    let ram = factors.get(MetricKind::Ram);
    let temperature = factors.get(MetricKind::Temperature);
    let disk = factors.get(MetricKind::Disk);

    let mut penalty = 0.0;
    if cpu > 70.0 && ram > 70.0 {
        penalty += 10.0;
    }
    if temperature > 70.0 && cpu > 70.0 {
        penalty += 15.0;
    }
    if disk > 80.0 && ram > 70.0 {
        penalty += 5.0;
    }
    penalty
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_factors(value: f64) -> RiskFactors {
        MetricKind::ALL.iter().map(|k| (*k, value)).collect()
    }

    #[test]
    fn test_component_risk_bounds_and_monotonic() {
        let config = ScoringConfig::default();
        let scorer = RiskScorer::new(&config);
        let threshold = config.thresholds.cpu;

        let mut previous = -1.0;
        for step in 0..=1000 {
            let value = step as f64 / 10.0;
            let risk = scorer.component_risk(value, threshold, None, MetricKind::Cpu);
            assert!((0.0..=100.0).contains(&risk), "risk {} at {}", risk, value);
            assert!(risk >= previous, "not monotonic at {}", value);
            previous = risk;
        }

        assert_eq!(scorer.component_risk(threshold.critical, threshold, None, MetricKind::Cpu), 100.0);
        assert!(scorer.component_risk(0.0, threshold, None, MetricKind::Cpu).abs() < 1e-9);
        assert!((scorer.component_risk(threshold.warning, threshold, None, MetricKind::Cpu) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_battery_risk_inverted() {
        let config = ScoringConfig::default();
        let scorer = RiskScorer::new(&config);

        assert_eq!(scorer.battery_risk(0.0), 100.0);
        let mut previous = f64::MAX;
        for level in 0..=100 {
            let risk = scorer.battery_risk(level as f64);
            assert!(risk <= previous, "battery risk rose at {}", level);
            previous = risk;
        }
        assert!(scorer.battery_risk(100.0).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_risk_extremes() {
        let config = ScoringConfig::default();
        let scorer = RiskScorer::new(&config);

        assert_eq!(scorer.weighted_risk(&all_factors(0.0)), 0.0);
        assert_eq!(scorer.weighted_risk(&all_factors(100.0)), 100.0);
        assert_eq!(scorer.weighted_risk(&RiskFactors::new()), 0.0);
    }

    #[test]
    fn test_interaction_penalties() {
        let config = ScoringConfig::default();
        let scorer = RiskScorer::new(&config);

        let factors: RiskFactors = [(MetricKind::Cpu, 75.0), (MetricKind::Ram, 75.0)]
            .into_iter()
            .collect();
        let expected = 75.0 * 0.25 + 75.0 * 0.20 + 10.0;
        assert!((scorer.weighted_risk(&factors) - expected).abs() < 1e-9);

        let hot: RiskFactors = [(MetricKind::Cpu, 75.0), (MetricKind::Temperature, 75.0)]
            .into_iter()
            .collect();
        let expected = 75.0 * 0.25 + 75.0 * 0.30 + 15.0;
        assert!((scorer.weighted_risk(&hot) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_rising_trend_compounds_more_than_falling_discounts() {
        let config = ScoringConfig::default();
        let scorer = RiskScorer::new(&config);
        let threshold = config.thresholds.cpu;

        let ramp = |values: &[f64]| {
            MetricWindow::new(
                values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| MetricSample::new("dev", i as i64).with_usage(*v, 0.0, 0.0))
                    .collect(),
            )
        };
        let rising = ramp(&[40.0, 45.0, 50.0]);
        let falling = ramp(&[50.0, 45.0, 40.0]);

        let base = scorer.component_risk(45.0, threshold, None, MetricKind::Cpu);
        let up = scorer.component_risk(45.0, threshold, Some(&rising), MetricKind::Cpu);
        let down = scorer.component_risk(45.0, threshold, Some(&falling), MetricKind::Cpu);

        assert!(up > base);
        assert!(down < base);
        assert!(up - base > base - down);
    }

    #[test]
    fn test_volatility_penalty_needs_four_samples() {
        let config = ScoringConfig::default();
        let scorer = RiskScorer::new(&config);
        let threshold = config.thresholds.cpu;

        let noisy = MetricWindow::new(
            [10.0, 60.0, 10.0, 60.0, 10.0, 60.0]
                .iter()
                .enumerate()
                .map(|(i, v)| MetricSample::new("dev", i as i64).with_usage(*v, 0.0, 0.0))
                .collect(),
        );
        let trend = TrendAnalyzer::new().trend(&noisy, MetricKind::Cpu);
        let base = scorer.component_risk(30.0, threshold, None, MetricKind::Cpu);
        let expected = (base + trend * if trend > 0.0 { 20.0 } else { 10.0 } + 10.0).clamp(0.0, 100.0);
        let risk = scorer.component_risk(30.0, threshold, Some(&noisy), MetricKind::Cpu);
        assert!((risk - expected).abs() < 1e-9);
    }

    #[test]
    fn test_missing_metrics_score_zero() {
        let config = ScoringConfig::default();
        let scorer = RiskScorer::new(&config);
        let sample = MetricSample::new("dev", 0).with_usage(0.0, 0.0, 0.0);

        let breakdown = scorer.score(&sample, None);
        assert_eq!(breakdown.factors.get(MetricKind::Temperature), 0.0);
        assert_eq!(breakdown.factors.get(MetricKind::Battery), 0.0);
        assert_eq!(breakdown.total, 0.0);
    }
}
