//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use risk_lib::{AlertSeverity, Priority, RiskLevel, RiskReport};
use serde::Serialize;
use std::str::FromStr;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

#[derive(Tabled)]
struct FactorRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Risk")]
    risk: String,
}

#[derive(Tabled)]
struct AlertRow {
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Action")]
    action: String,
}

#[derive(Tabled)]
struct RecommendationRow {
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Description")]
    description: String,
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

pub fn color_level(level: RiskLevel) -> String {
    let text = level.to_string();
    match level {
        RiskLevel::Low => text.green().to_string(),
        RiskLevel::Warning => text.yellow().to_string(),
        RiskLevel::Critical => text.red().bold().to_string(),
    }
}

fn color_severity(severity: AlertSeverity) -> String {
    let text = severity.to_string();
    match severity {
        AlertSeverity::Warning => text.yellow().to_string(),
        AlertSeverity::Critical => text.red().to_string(),
    }
}

fn color_priority(priority: Priority) -> String {
    let text = priority.to_string();
    match priority {
        Priority::Low => text.normal().to_string(),
        Priority::Medium => text.yellow().to_string(),
        Priority::High => text.red().to_string(),
    }
}

/// Color a risk value by the 50/80 cutoffs
pub fn color_risk(value: f64) -> String {
    let text = format!("{:.1}", value);
    match RiskLevel::from_score(value) {
        RiskLevel::Low => text.green().to_string(),
        RiskLevel::Warning => text.yellow().to_string(),
        RiskLevel::Critical => text.red().to_string(),
    }
}

pub fn print_report(report: &RiskReport) {
    println!("{} {}", "Device:".bold(), report.device_id);
    println!(
        "{} {} ({})",
        "Total risk:".bold(),
        color_risk(report.total_risk),
        color_level(report.risk_level)
    );
    println!(
        "{} {} - {} ({})",
        "Failure probability:".bold(),
        format_percent(report.failure_probability),
        report.prediction,
        report.time_to_failure
    );
    println!("{} {}", "Source:".bold(), report.provenance);

    if let Some(model) = &report.model {
        println!(
            "{} {} (predicted {}, accuracy {:.2})",
            "Model:".bold(),
            model.version,
            model.predicted_status,
            model.accuracy
        );
    }

    if let Some(trend) = &report.trend_analysis {
        println!(
            "{} {} ({:+.2})",
            "Trend:".bold(),
            trend.direction,
            trend.overall_trend
        );
    }

    let factors: Vec<FactorRow> = report
        .risk_factors
        .iter()
        .map(|(metric, risk)| FactorRow {
            metric: metric.to_string(),
            risk: color_risk(risk),
        })
        .collect();
    println!("\n{}", Table::new(factors).with(Style::rounded()));

    if report.alerts.is_empty() {
        print_success("No alerts");
    } else {
        let alerts: Vec<AlertRow> = report
            .alerts
            .iter()
            .map(|a| AlertRow {
                severity: color_severity(a.severity),
                metric: a.metric.to_string(),
                message: a.message.clone(),
                action: a.action.clone(),
            })
            .collect();
        println!("\n{}", Table::new(alerts).with(Style::rounded()));
    }

    if !report.recommendations.is_empty() {
        let recommendations: Vec<RecommendationRow> = report
            .recommendations
            .iter()
            .map(|r| RecommendationRow {
                priority: color_priority(r.priority),
                title: r.title.clone(),
                description: r.description.clone(),
            })
            .collect();
        println!("\n{}", Table::new(recommendations).with(Style::rounded()));
    }
}
