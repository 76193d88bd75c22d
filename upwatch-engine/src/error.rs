//! Error types for the device probe.

use thiserror::Error;

/// Errors that can occur while probing the network.
///
/// These never reach callers of the monitor: any probe error becomes a
/// zero sample and an Offline device.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Probe timed out")]
    Timeout,

    /// The measured round trip was not a usable number.
    #[error("Invalid round-trip time: {0}")]
    InvalidSample(String),
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProbeError::Timeout
        } else if err.is_connect() {
            ProbeError::Connection(err.to_string())
        } else {
            ProbeError::Http(err.to_string())
        }
    }
}

impl From<tokio::time::error::Elapsed> for ProbeError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ProbeError::Timeout
    }
}
