//! Monitor configuration.

use std::ops::RangeInclusive;
use std::time::Duration;

/// Server count range offered by the settings UI.
pub const SERVER_COUNT_RANGE: RangeInclusive<usize> = 1..=8;

/// Service count range offered by the settings UI.
pub const SERVICE_COUNT_RANGE: RangeInclusive<usize> = 0..=12;

/// Virtual machine count range offered by the settings UI.
pub const VM_COUNT_RANGE: RangeInclusive<usize> = 0..=6;

/// Default address the device probe measures against.
pub const DEFAULT_PROBE_URL: &str = "https://1.1.1.1";

/// How many entities of each kind to simulate.
///
/// The engine takes counts as given. Callers clamp with [`clamped`]
/// before submitting user input.
///
/// [`clamped`]: SimulationCounts::clamped
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SimulationCounts {
    pub servers: usize,
    pub services: usize,
    pub virtual_machines: usize,
}

impl SimulationCounts {
    pub fn new(servers: usize, services: usize, virtual_machines: usize) -> Self {
        Self {
            servers,
            services,
            virtual_machines,
        }
    }

    /// Clamp each count into the range the settings UI allows.
    pub fn clamped(self) -> Self {
        Self {
            servers: clamp_to(self.servers, SERVER_COUNT_RANGE),
            services: clamp_to(self.services, SERVICE_COUNT_RANGE),
            virtual_machines: clamp_to(self.virtual_machines, VM_COUNT_RANGE),
        }
    }
}

impl Default for SimulationCounts {
    fn default() -> Self {
        Self {
            servers: 2,
            services: 3,
            virtual_machines: 1,
        }
    }
}

fn clamp_to(value: usize, range: RangeInclusive<usize>) -> usize {
    value.clamp(*range.start(), *range.end())
}

/// Cadences and collaborator settings for a [`Monitor`](crate::Monitor).
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Entity telemetry tick.
    pub tick_interval: Duration,
    /// Device probe cadence, independent of the entity tick.
    pub device_interval: Duration,
    /// How often the simulated warning moves to another entity.
    pub warning_interval: Duration,
    /// Deep-test cycle length.
    pub deep_test_interval: Duration,
    /// Progress added per deep-test cycle.
    pub deep_test_step: f64,
    pub probe_url: String,
    /// Upper bound on a single probe, after which it counts as failed.
    pub probe_timeout: Duration,
    pub counts: SimulationCounts,
    pub simulation_enabled: bool,
    /// Forward the overall status to the icon selector. When off the
    /// selector is always asked for the default icon.
    pub dynamic_icon: bool,
    pub device_name: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(2),
            device_interval: Duration::from_secs(2),
            warning_interval: Duration::from_secs(30),
            deep_test_interval: Duration::from_secs(5),
            deep_test_step: 0.1,
            probe_url: DEFAULT_PROBE_URL.to_string(),
            probe_timeout: Duration::from_secs(5),
            counts: SimulationCounts::default(),
            simulation_enabled: true,
            dynamic_icon: true,
            device_name: "This Device".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cadences() {
        let config = MonitorConfig::default();
        assert_eq!(config.tick_interval, Duration::from_secs(2));
        assert_eq!(config.device_interval, Duration::from_secs(2));
        assert_eq!(config.warning_interval, Duration::from_secs(30));
        assert_eq!(config.probe_url, "https://1.1.1.1");
    }

    #[test]
    fn clamped_counts_stay_in_ui_ranges() {
        let counts = SimulationCounts::new(0, 40, 9).clamped();
        assert_eq!(counts, SimulationCounts::new(1, 12, 6));

        let counts = SimulationCounts::new(3, 4, 2).clamped();
        assert_eq!(counts, SimulationCounts::new(3, 4, 2));
    }

    #[test]
    fn counts_deserialize_with_defaults() {
        let counts: SimulationCounts = serde_json::from_str(r#"{"servers": 5}"#).unwrap();
        assert_eq!(counts.servers, 5);
        assert_eq!(counts.services, 3);
        assert_eq!(counts.virtual_machines, 1);
    }
}
