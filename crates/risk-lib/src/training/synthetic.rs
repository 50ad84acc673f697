//! Synthetic training data for cold starts
//!
//! The labelling formula here is kept separate from the runtime scorer: it
//! uses fixed step contributions per metric rather than the configurable
//! thresholds and weights. The two can drift apart; changing either one
//! means re-checking the model's accuracy against the other.

use super::dataset::Dataset;
use crate::models::{encode_features, HealthClass, NO_BATTERY_SENTINEL};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Risk label for one (cpu, ram, disk, temperature, battery) tuple.
///
/// A missing temperature contributes nothing; a missing battery or one at
/// 100% means a machine on mains power.
pub fn synthetic_risk(
    cpu: f64,
    ram: f64,
    disk: f64,
    temperature: Option<f64>,
    battery: Option<f64>,
) -> f64 {
    let mut risk = 0.0;

    risk += if cpu > 85.0 {
        30.0
    } else if cpu > 70.0 {
        20.0
    } else {
        cpu / 70.0 * 15.0
    };

    risk += if ram > 90.0 {
        25.0
    } else if ram > 75.0 {
        15.0
    } else {
        ram / 75.0 * 10.0
    };

    if let Some(temp) = temperature {
        risk += if temp > 80.0 {
            25.0
        } else if temp > 70.0 {
            15.0
        } else {
            (temp - 40.0) / 30.0 * 10.0
        };
    }

    risk += if disk > 95.0 {
        20.0
    } else if disk > 85.0 {
        10.0
    } else {
        (disk - 30.0) / 55.0 * 10.0
    };

    if let Some(level) = battery.filter(|b| *b < NO_BATTERY_SENTINEL) {
        risk += if level < 15.0 {
            10.0
        } else if level < 25.0 {
            5.0
        } else {
            (100.0 - level) / 75.0 * 5.0
        };
    }

    risk.clamp(0.0, 100.0)
}

/// Generate `count` labelled samples from a seeded generator.
///
/// Labels follow the 50/80 cutoffs on [`synthetic_risk`], with a share of
/// `label_noise` relabelled uniformly at random.
pub fn synthesize(count: usize, seed: u64, label_noise: f64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut dataset = Dataset::with_capacity(count);

    for _ in 0..count {
        let cpu = rng.gen_range(10.0..100.0);
        let ram = rng.gen_range(20.0..100.0);
        let disk = rng.gen_range(30.0..100.0);
        let temperature = rng.gen_range(40.0..90.0);
        let battery_level: f64 = rng.gen_range(10.0..100.0);
        let battery = if rng.gen_bool(0.5) { Some(battery_level) } else { None };

        let risk = synthetic_risk(cpu, ram, disk, Some(temperature), battery);
        let mut label = HealthClass::from_risk(risk);
        if rng.gen::<f64>() < label_noise {
            label = HealthClass::from_index(rng.gen_range(0..HealthClass::COUNT));
        }

        dataset.push(
            encode_features(cpu, ram, disk, Some(temperature), battery),
            label,
            risk,
        );
    }

    dataset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_risk_steps() {
        // 30 + 25 + 25 + 20 + 10
        assert_eq!(synthetic_risk(90.0, 95.0, 99.0, Some(85.0), Some(10.0)), 100.0);
        assert!((synthetic_risk(35.0, 37.5, 30.0, Some(40.0), None) - 12.5).abs() < 1e-9);
        assert_eq!(
            synthetic_risk(50.0, 50.0, 50.0, Some(50.0), Some(100.0)),
            synthetic_risk(50.0, 50.0, 50.0, Some(50.0), None)
        );
    }

    #[test]
    fn test_synthesize_is_reproducible() {
        let a = synthesize(200, 42, 0.1);
        let b = synthesize(200, 42, 0.1);
        assert_eq!(a, b);
        assert_eq!(a.len(), 200);
        assert_ne!(a, synthesize(200, 7, 0.1));
    }

    #[test]
    fn test_synthesize_covers_every_class() {
        let data = synthesize(1000, 42, 0.1);
        let counts = data.class_counts();
        assert!(counts.healthy > 0);
        assert!(counts.warning > 0);
        assert!(counts.critical > 0);
        assert!(data
            .features()
            .iter()
            .any(|f| f[4] == NO_BATTERY_SENTINEL));
    }

    #[test]
    fn test_labels_match_risk_without_noise() {
        let data = synthesize(300, 42, 0.0);
        for (label, risk) in data.labels().iter().zip(data.targets()) {
            assert_eq!(*label, HealthClass::from_risk(*risk));
        }
    }
}
