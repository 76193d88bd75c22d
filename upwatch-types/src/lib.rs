//! # upwatch-types
//!
//! Entity model for upwatch. This crate defines the records the monitoring
//! engine mutates on every tick and publishes to observers: servers, the
//! services and virtual machines hosted on them, and the local device probe.
//!
//! ## Design Goals
//!
//! - **Passive records**: Entities carry state only; all transitions live in `upwatch-engine`
//! - **Id-based relations**: Services and VMs point at their server by [`EntityId`], never by reference
//! - **Bounded history**: [`SampleHistory`] evicts oldest-first so it never grows past its cap
//! - **Optional serialization**: Enable the `serde` feature to export snapshots as JSON
//!
//! ## Example
//!
//! ```rust
//! use upwatch_types::{Server, Service, Status};
//!
//! let server = Server::new("Web Server");
//! let mut service = Service::new("API Gateway", server.id);
//!
//! service.history.push(24.0);
//! service.history.push_smoothed(40.0);
//!
//! assert_eq!(service.status, Status::Online);
//! assert_eq!(service.server_id, server.id);
//! assert_eq!(service.history.len(), 2);
//! ```

mod entity;
mod history;
mod resources;
mod snapshot;
mod status;

pub use entity::*;
pub use history::*;
pub use resources::*;
pub use snapshot::*;
pub use status::*;

/// History cap for simulated servers, services and virtual machines.
pub const SIMULATED_HISTORY_CAP: usize = 30;

/// History cap for the local device probe.
pub const DEVICE_HISTORY_CAP: usize = 20;
