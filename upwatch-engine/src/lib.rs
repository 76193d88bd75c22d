//! # upwatch-engine
//!
//! Simulated uptime monitoring for a fleet of servers, services and
//! virtual machines, plus a real latency probe for the local device.
//!
//! The engine keeps every entity in memory, advances synthetic latency and
//! resource telemetry on a timer, rolls the per-entity statuses up into one
//! overall health status, and can force the fleet through downtime, warning
//! and recovery scenarios for demos and testing.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use upwatch_engine::{Monitor, MonitorConfig, SimulationCounts};
//!
//! #[tokio::main]
//! async fn main() {
//!     let monitor = Monitor::new(MonitorConfig::default());
//!
//!     // Telemetry every 2 seconds, device probe every 2 seconds
//!     monitor.start();
//!     monitor.start_device_monitoring();
//!
//!     // Take a random server down along with its services and VMs
//!     monitor.set_simulate_downtime(true);
//!     println!("{}", monitor.overall_status());
//!
//!     // Bring everything back
//!     monitor.set_simulate_downtime(false);
//!     monitor.regenerate(SimulationCounts::new(4, 6, 2));
//! }
//! ```
//!
//! ## Layout
//!
//! - [`telemetry`]: synthetic samples and resource drift
//! - [`aggregator`]: weighted latency and overall status
//! - [`scenario`]: forced failure, warning and recovery scenarios
//! - [`Monitor`]: owns the state and runs the timers

pub mod aggregator;
mod collaborators;
mod config;
mod error;
mod mock;
mod monitor;
mod output;
mod probe;
pub mod scenario;
mod state;
pub mod telemetry;

pub use aggregator::{aggregate, aggregate_snapshot, weighted_latency, Aggregate, AggregateInput};
pub use collaborators::{IconSelector, Notification, Notifier, TracingIconSelector, TracingNotifier};
pub use config::{
    MonitorConfig, SimulationCounts, DEFAULT_PROBE_URL, SERVER_COUNT_RANGE, SERVICE_COUNT_RANGE,
    VM_COUNT_RANGE,
};
pub use error::ProbeError;
pub use mock::generate_fleet;
pub use monitor::{Monitor, MonitorBuilder};
pub use output::Output;
pub use probe::{apply_probe_result, HttpProbe, LatencyProbe, DEVICE_WARNING_MS};
pub use scenario::{DeepTest, Scenario};
pub use state::{Fleet, LatencyLog};

// Re-export types for convenience
pub use upwatch_types::{
    EntityId, EntityKind, FleetSnapshot, LatencyPoint, LocalDevice, Monitored,
    NotificationSettings, NotificationUpdate, ResourceMetrics, SampleHistory, Server, Service,
    Status, StorageVolume, VirtualMachine,
};
