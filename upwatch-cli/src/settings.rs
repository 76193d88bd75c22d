//! Runner settings: defaults, then an optional TOML file, then
//! `UPWATCH_*` environment variables, then command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use upwatch_engine::{MonitorConfig, SimulationCounts, DEFAULT_PROBE_URL};

use crate::duration::parse_duration;

/// Raw settings as read from file and environment.
///
/// Durations stay strings here so they can be written as "2s" or "500ms".
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub servers: usize,
    pub services: usize,
    pub vms: usize,
    pub simulation: bool,
    pub simulate_downtime: bool,
    pub simulate_warnings: bool,
    pub device_monitoring: bool,
    pub deep_test: bool,
    pub dynamic_icon: bool,
    pub probe_url: String,
    pub probe_timeout: String,
    pub tick_interval: String,
    pub device_interval: String,
    pub warning_interval: String,
    pub deep_test_interval: String,
    pub run_for: Option<String>,
    pub export: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        let counts = SimulationCounts::default();
        Self {
            servers: counts.servers,
            services: counts.services,
            vms: counts.virtual_machines,
            simulation: true,
            simulate_downtime: false,
            simulate_warnings: false,
            device_monitoring: false,
            deep_test: false,
            dynamic_icon: true,
            probe_url: DEFAULT_PROBE_URL.to_string(),
            probe_timeout: "5s".to_string(),
            tick_interval: "2s".to_string(),
            device_interval: "2s".to_string(),
            warning_interval: "30s".to_string(),
            deep_test_interval: "5s".to_string(),
            run_for: None,
            export: None,
            output: None,
            seed: None,
        }
    }
}

/// Settings with every duration parsed, ready to drive a monitor.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub monitor: MonitorConfig,
    pub simulate_downtime: bool,
    pub simulate_warnings: bool,
    pub device_monitoring: bool,
    pub deep_test: bool,
    pub run_for: Option<Duration>,
    pub export: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub seed: Option<u64>,
}

impl Settings {
    /// Load settings from an optional TOML file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(Environment::with_prefix("UPWATCH").try_parsing(true));

        let config = builder.build().context("Failed to load settings")?;
        config
            .try_deserialize()
            .context("Invalid settings")
    }

    /// Parse durations and clamp counts into the supported ranges.
    pub fn resolve(&self) -> Result<RunPlan> {
        let duration = |field: &str, value: &str| {
            parse_duration(value).with_context(|| format!("Invalid {field}"))
        };
        // Timer periods and the probe timeout must be non-zero
        let period = |field: &str, value: &str| -> Result<Duration> {
            let parsed = duration(field, value)?;
            if parsed.is_zero() {
                bail!("Invalid {field}: must be greater than zero");
            }
            Ok(parsed)
        };

        let requested = SimulationCounts::new(self.servers, self.services, self.vms);
        let counts = requested.clamped();
        if counts != requested {
            tracing::warn!(
                ?requested,
                ?counts,
                "entity counts outside supported ranges, clamping"
            );
        }

        let monitor = MonitorConfig {
            tick_interval: period("tick_interval", &self.tick_interval)?,
            device_interval: period("device_interval", &self.device_interval)?,
            warning_interval: period("warning_interval", &self.warning_interval)?,
            deep_test_interval: period("deep_test_interval", &self.deep_test_interval)?,
            probe_url: self.probe_url.clone(),
            probe_timeout: period("probe_timeout", &self.probe_timeout)?,
            counts,
            simulation_enabled: self.simulation,
            dynamic_icon: self.dynamic_icon,
            ..MonitorConfig::default()
        };

        let run_for = self
            .run_for
            .as_deref()
            .map(|value| duration("run_for", value))
            .transpose()?;

        Ok(RunPlan {
            monitor,
            simulate_downtime: self.simulate_downtime,
            simulate_warnings: self.simulate_warnings,
            device_monitoring: self.device_monitoring,
            deep_test: self.deep_test,
            run_for,
            export: self.export.clone(),
            output: self.output.clone(),
            seed: self.seed,
        })
    }
}
