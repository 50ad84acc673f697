//! Alert and recommendation generation
//!
//! Alerts fire per metric on its raw value against the configured
//! thresholds. Recommendations follow the overall risk level, the
//! per-metric risk factors and the window trend.

use crate::config::ThresholdConfig;
use crate::models::{
    Alert, AlertSeverity, MetricKind, MetricSample, MetricWindow, Priority, Recommendation,
    RiskFactors, RiskLevel, TrendDirection, TrendSummary,
};
use crate::scoring::TrendAnalyzer;

/// Per-metric trend above which an alert notes a rising trend
const RISING_ALERT_TREND: f64 = 0.2;

/// Factor risk above which a metric gets a targeted recommendation
const RECOMMENDATION_FACTOR_THRESHOLD: f64 = 70.0;

/// Build alerts for every metric past its warning threshold
pub fn build_alerts(
    sample: &MetricSample,
    window: Option<&MetricWindow>,
    thresholds: &ThresholdConfig,
) -> Vec<Alert> {
    let analyzer = TrendAnalyzer::new();
    let mut alerts = Vec::new();

    for kind in MetricKind::ALL {
        let value = match sample.value(kind) {
            Some(v) => v,
            None => continue,
        };
        let threshold = thresholds.for_metric(kind);

        let severity = if kind == MetricKind::Battery {
            if value < threshold.critical {
                AlertSeverity::Critical
            } else if value < threshold.warning {
                AlertSeverity::Warning
            } else {
                continue;
            }
        } else if value > threshold.critical {
            AlertSeverity::Critical
        } else if value > threshold.warning {
            AlertSeverity::Warning
        } else {
            continue;
        };

        let mut message = alert_message(kind, severity, value);
        let rising = window
            .map(|w| analyzer.trend(w, kind) > RISING_ALERT_TREND)
            .unwrap_or(false);
        if rising {
            message.push_str(" - trend rising");
        }

        alerts.push(Alert {
            metric: kind,
            severity,
            message,
            action: alert_action(kind).to_string(),
        });
    }

    alerts
}

fn alert_message(kind: MetricKind, severity: AlertSeverity, value: f64) -> String {
    let critical = severity == AlertSeverity::Critical;
    match kind {
        MetricKind::Cpu => format!("CPU usage {} ({:.1}%)", if critical { "critical" } else { "high" }, value),
        MetricKind::Ram => format!("Memory usage {} ({:.1}%)", if critical { "critical" } else { "high" }, value),
        MetricKind::Temperature => {
            format!("Temperature {} ({:.1}°C)", if critical { "critical" } else { "high" }, value)
        }
        MetricKind::Disk => format!(
            "Disk space {} ({:.1}% used)",
            if critical { "critically low" } else { "low" },
            value
        ),
        MetricKind::Battery => {
            format!("Battery level {} ({:.1}%)", if critical { "critical" } else { "low" }, value)
        }
    }
}

fn alert_action(kind: MetricKind) -> &'static str {
    match kind {
        MetricKind::Cpu => "Inspect heavy processes and stop non-essential ones",
        MetricKind::Ram => "Close non-essential applications or add memory",
        MetricKind::Temperature => "Check the cooling system immediately",
        MetricKind::Disk => "Delete unnecessary files or expand storage",
        MetricKind::Battery => "Connect the device to a charger",
    }
}

/// Build the ordered recommendation list
pub fn build_recommendations(
    risk_level: RiskLevel,
    factors: &RiskFactors,
    trend: Option<&TrendSummary>,
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if risk_level == RiskLevel::Critical {
        recommendations.push(recommendation(
            Priority::High,
            "Immediate intervention required",
            "The device is in a critical state and needs immediate attention",
            &[
                "Inspect the device in person",
                "Stop heavy applications",
                "Check the cooling system",
                "Review system logs",
            ],
        ));
    }

    for kind in MetricKind::ALL {
        if factors.get(kind) > RECOMMENDATION_FACTOR_THRESHOLD {
            recommendations.push(metric_recommendation(kind));
        }
    }

    match trend.map(|t| t.direction) {
        Some(TrendDirection::Increasing) => recommendations.push(recommendation(
            Priority::High,
            "Rising utilization trend",
            "Resource usage keeps increasing across recent samples",
            &[
                "Keep the device under continuous monitoring",
                "Plan a hardware upgrade",
                "Review recently installed applications",
            ],
        )),
        Some(TrendDirection::Volatile) => recommendations.push(recommendation(
            Priority::Medium,
            "Unstable resource usage",
            "Resource usage fluctuates strongly across recent samples",
            &[
                "Check background programs",
                "Review scheduled tasks",
                "Run a malware scan",
            ],
        )),
        _ => {}
    }

    recommendations
}

fn metric_recommendation(kind: MetricKind) -> Recommendation {
    match kind {
        MetricKind::Cpu => recommendation(
            Priority::Medium,
            "Reduce CPU load",
            "Processor usage is high",
            &[
                "Close unnecessary applications",
                "Check background processes",
                "Update antivirus software",
            ],
        ),
        MetricKind::Ram => recommendation(
            Priority::Medium,
            "Reduce memory pressure",
            "Memory usage is high",
            &[
                "Close open applications",
                "Restart the device",
                "Consider adding RAM",
            ],
        ),
        MetricKind::Temperature => recommendation(
            Priority::High,
            "Improve cooling",
            "Device temperature is high",
            &[
                "Clean the fan and vents",
                "Check the CPU thermal paste",
                "Improve airflow around the device",
            ],
        ),
        MetricKind::Disk => recommendation(
            Priority::Medium,
            "Free disk space",
            "Free disk space is running low",
            &[
                "Delete temporary files",
                "Empty the recycle bin",
                "Uninstall unused programs",
            ],
        ),
        MetricKind::Battery => recommendation(
            Priority::Medium,
            "Restore battery charge",
            "Battery level is low",
            &[
                "Connect the device to a charger",
                "Reduce screen brightness",
                "Check battery health",
            ],
        ),
    }
}

fn recommendation(priority: Priority, title: &str, description: &str, actions: &[&str]) -> Recommendation {
    Recommendation {
        priority,
        title: title.to_string(),
        description: description.to_string(),
        actions: actions.iter().map(|a| a.to_string()).collect(),
    }
}
