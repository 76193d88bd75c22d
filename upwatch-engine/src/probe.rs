//! Device latency probe.
//!
//! The local device is the one entity measured over the real network:
//! an HTTPS request to a fixed address, timed end to end.

use std::fmt::Debug;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use upwatch_types::{LocalDevice, Status};

use crate::ProbeError;

/// Device samples above this many milliseconds mark the device Warning.
pub const DEVICE_WARNING_MS: f64 = 100.0;

/// Something that can measure a network round trip.
#[async_trait]
pub trait LatencyProbe: Send + Sync + Debug {
    /// Measure one round trip.
    async fn measure(&self) -> Result<Duration, ProbeError>;

    /// Human-readable description of what is being probed.
    fn target(&self) -> &str;
}

/// Probe that times an HTTPS GET against a fixed URL.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    url: String,
}

impl HttpProbe {
    /// Create a probe for `url` whose requests give up after `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "falling back to default HTTP client for probe");
                Client::new()
            });

        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl LatencyProbe for HttpProbe {
    async fn measure(&self) -> Result<Duration, ProbeError> {
        let start = Instant::now();
        // Any response at all means the address was reachable; only the
        // round trip matters, not the status code.
        let _response = self.client.get(&self.url).send().await?;
        Ok(start.elapsed())
    }

    fn target(&self) -> &str {
        &self.url
    }
}

/// Apply a probe outcome to the device and return the recorded sample.
///
/// A failed probe records 0 and forces Offline. A sample above
/// [`DEVICE_WARNING_MS`] forces Warning, anything else Online. The device
/// keeps raw samples in its history.
pub fn apply_probe_result(device: &mut LocalDevice, result: Result<Duration, ProbeError>) -> f64 {
    let sample = result.and_then(|rtt| {
        let ms = rtt.as_secs_f64() * 1000.0;
        if ms.is_finite() && ms >= 0.0 {
            Ok(ms)
        } else {
            Err(ProbeError::InvalidSample(format!("{ms}")))
        }
    });

    match sample {
        Ok(ms) => {
            device.status = if ms > DEVICE_WARNING_MS {
                Status::Warning
            } else {
                Status::Online
            };
            device.latest_sample = ms;
            device.history.push(ms);
            ms
        }
        Err(err) => {
            tracing::warn!(probe = %device.probe_target, error = %err, "device probe failed");
            device.status = Status::Offline;
            device.latest_sample = 0.0;
            device.history.push(0.0);
            0.0
        }
    }
}
