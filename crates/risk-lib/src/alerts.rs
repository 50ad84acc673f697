//! Alert deduplication
//!
//! The same condition on the same device is reported on every assessment
//! while it lasts. Only the first occurrence inside the dedup window counts
//! as a new alert.

use crate::models::{Alert, MetricKind};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Default deduplication window (15 minutes)
pub const DEFAULT_DEDUP_WINDOW_SECS: u64 = 15 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DedupKey {
    device_id: String,
    metric: MetricKind,
    message: String,
}

impl DedupKey {
    fn new(device_id: &str, alert: &Alert) -> Self {
        Self {
            device_id: device_id.to_string(),
            metric: alert.metric,
            message: normalize_message(&alert.message),
        }
    }
}

/// Lowercase, replace digit runs with `#`, collapse whitespace.
///
/// "CPU usage high (75.3%)" and "CPU usage high (78.1%)" dedup together.
pub fn normalize_message(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut in_digits = false;
    let mut in_space = false;

    for c in message.trim().chars() {
        if c.is_ascii_digit() {
            if !in_digits {
                out.push('#');
            }
            in_digits = true;
            in_space = false;
        } else if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
            in_digits = false;
        } else {
            out.extend(c.to_lowercase());
            in_digits = false;
            in_space = false;
        }
    }
    out
}

#[derive(Debug)]
pub struct AlertDeduplicator {
    window: Duration,
    recent: RwLock<HashMap<DedupKey, Instant>>,
}

impl Default for AlertDeduplicator {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_DEDUP_WINDOW_SECS))
    }
}

impl AlertDeduplicator {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            recent: RwLock::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn should_suppress(&self, device_id: &str, alert: &Alert) -> bool {
        let key = DedupKey::new(device_id, alert);
        let recent = match self.recent.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        recent
            .get(&key)
            .map_or(false, |last| last.elapsed() < self.window)
    }

    pub fn record(&self, device_id: &str, alert: &Alert) {
        let key = DedupKey::new(device_id, alert);
        let mut recent = match self.recent.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        recent.insert(key, Instant::now());
        recent.retain(|_, time| time.elapsed() < self.window);
    }

    /// Alerts not raised for this device within the window; records them.
    ///
    /// Check and insert happen under one write lock, so concurrent
    /// assessments of a device never both report the same alert as new.
    pub fn filter_new(&self, device_id: &str, alerts: &[Alert]) -> Vec<Alert> {
        let mut recent = match self.recent.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        recent.retain(|_, time| time.elapsed() < self.window);

        let now = Instant::now();
        let mut fresh = Vec::new();
        for alert in alerts {
            let key = DedupKey::new(device_id, alert);
            if recent.contains_key(&key) {
                continue;
            }
            recent.insert(key, now);
            fresh.push(alert.clone());
        }
        fresh
    }

    pub fn tracked(&self) -> usize {
        match self.recent.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AlertSeverity;

    fn alert(metric: MetricKind, message: &str) -> Alert {
        Alert {
            metric,
            severity: AlertSeverity::Warning,
            message: message.to_string(),
            action: "check".to_string(),
        }
    }

    #[test]
    fn test_normalize_message() {
        assert_eq!(
            normalize_message("  CPU usage   high (75.3%) "),
            "cpu usage high (#.#%)"
        );
        assert_eq!(
            normalize_message("CPU usage high (78.1%)"),
            normalize_message("cpu usage HIGH (9.99%)")
        );
    }

    #[test]
    fn test_duplicate_within_window_is_suppressed() {
        let dedup = AlertDeduplicator::default();
        let first = vec![alert(MetricKind::Cpu, "CPU usage high (75.0%)")];
        let second = vec![alert(MetricKind::Cpu, "CPU usage high (77.5%)")];

        assert_eq!(dedup.filter_new("dev-1", &first).len(), 1);
        assert!(dedup.filter_new("dev-1", &second).is_empty());
        // another device or metric is independent
        assert_eq!(dedup.filter_new("dev-2", &second).len(), 1);
        assert_eq!(
            dedup
                .filter_new("dev-1", &[alert(MetricKind::Ram, "CPU usage high (75.0%)")])
                .len(),
            1
        );
    }

    #[test]
    fn test_expired_entries_are_not_suppressed() {
        let dedup = AlertDeduplicator::new(Duration::from_millis(0));
        let alerts = vec![alert(MetricKind::Disk, "Disk usage critical (97.0%)")];

        assert_eq!(dedup.filter_new("dev-1", &alerts).len(), 1);
        assert_eq!(dedup.filter_new("dev-1", &alerts).len(), 1);
        assert_eq!(dedup.tracked(), 0);
    }

    #[test]
    fn test_concurrent_filters_report_alert_once() {
        let dedup = AlertDeduplicator::default();
        let alerts = vec![alert(MetricKind::Cpu, "CPU usage critical: 97%")];

        let reported: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| dedup.filter_new("device-1", &alerts).len()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(reported, 1);
        assert_eq!(dedup.tracked(), 1);
    }
}
