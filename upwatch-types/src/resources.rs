//! Resource usage metrics attached to servers, VMs and the device.

/// A named storage volume, sizes in GB.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StorageVolume {
    pub name: String,
    pub total: f64,
    pub used: f64,
}

impl StorageVolume {
    /// Create a volume, clamping `used` into `[0, total]`.
    pub fn new(name: impl Into<String>, total: f64, used: f64) -> Self {
        let total = total.max(0.0);
        Self {
            name: name.into(),
            total,
            used: used.clamp(0.0, total),
        }
    }

    pub fn free(&self) -> f64 {
        self.total - self.used
    }

    /// Used space as a percentage of total (0 for an empty volume).
    pub fn usage_percent(&self) -> f64 {
        if self.total <= 0.0 {
            return 0.0;
        }
        (self.used / self.total) * 100.0
    }
}

/// CPU, memory and storage usage for one machine.
///
/// Percentages are kept within `[0, 100]` and every volume satisfies
/// `used <= total`.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceMetrics {
    pub cpu: f64,
    pub memory: f64,
    pub volumes: Vec<StorageVolume>,
}

impl ResourceMetrics {
    /// Create metrics with clamped percentages.
    pub fn new(cpu: f64, memory: f64, volumes: Vec<StorageVolume>) -> Self {
        Self {
            cpu: clamp_percent(cpu),
            memory: clamp_percent(memory),
            volumes,
        }
    }

    /// Metrics reported when resource monitoring is unavailable.
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Highest usage percentage across all volumes.
    pub fn max_volume_usage(&self) -> Option<f64> {
        self.volumes
            .iter()
            .map(StorageVolume::usage_percent)
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
    }
}

/// Clamp a percentage into `[0, 100]`.
pub fn clamp_percent(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}
