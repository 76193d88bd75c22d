//! FleetSnapshot - a point-in-time view of everything being monitored.

use crate::{EntityId, LocalDevice, Server, Service, Status, VirtualMachine};

/// One entry in the rolling latency log.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LatencyPoint {
    /// Unix timestamp in milliseconds.
    pub timestamp_ms: u64,
    /// Latency in milliseconds.
    pub value: f64,
}

/// A point-in-time snapshot of the monitored fleet.
///
/// The monitor publishes one of these after every state change. Observers
/// get owned copies, so reading a snapshot never contends with a tick.
///
/// # Example
///
/// ```rust
/// use upwatch_types::{FleetSnapshot, Server, Service, Status};
///
/// let server = Server::new("Web Server");
/// let service = Service::new("Web Frontend", server.id);
///
/// let snapshot = FleetSnapshot {
///     servers: vec![server.clone()],
///     services: vec![service],
///     ..FleetSnapshot::default()
/// };
///
/// assert_eq!(snapshot.entity_count(), 2);
/// assert_eq!(snapshot.services_on(server.id).count(), 1);
/// assert_eq!(snapshot.count_by_status(Status::Online), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FleetSnapshot {
    /// Unix timestamp in milliseconds when this snapshot was taken.
    pub timestamp_ms: u64,

    /// System-wide health tier.
    pub overall: Status,

    /// Bracket-weighted average of all current latency samples.
    pub weighted_latency: f64,

    pub simulation_enabled: bool,
    pub simulate_downtime: bool,
    pub simulate_warnings: bool,

    /// Deep-test progress in `[0, 1)`, present while a deep test runs.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub deep_test_progress: Option<f64>,

    pub servers: Vec<Server>,
    pub services: Vec<Service>,
    pub virtual_machines: Vec<VirtualMachine>,

    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub device: Option<LocalDevice>,
}

impl FleetSnapshot {
    /// Total number of entities, the device included.
    pub fn entity_count(&self) -> usize {
        self.servers.len()
            + self.services.len()
            + self.virtual_machines.len()
            + usize::from(self.device.is_some())
    }

    /// Statuses of every entity.
    pub fn statuses(&self) -> impl Iterator<Item = Status> + '_ {
        self.servers
            .iter()
            .map(|s| s.status)
            .chain(self.services.iter().map(|s| s.status))
            .chain(self.virtual_machines.iter().map(|v| v.status))
            .chain(self.device.iter().map(|d| d.status))
    }

    /// Number of entities currently at `status`.
    pub fn count_by_status(&self, status: Status) -> usize {
        self.statuses().filter(|s| *s == status).count()
    }

    pub fn server(&self, id: EntityId) -> Option<&Server> {
        self.servers.iter().find(|s| s.id == id)
    }

    /// Services whose owning server is `server_id`.
    pub fn services_on(&self, server_id: EntityId) -> impl Iterator<Item = &Service> {
        self.services.iter().filter(move |s| s.server_id == server_id)
    }

    /// Virtual machines hosted on `server_id`.
    pub fn vms_on(&self, server_id: EntityId) -> impl Iterator<Item = &VirtualMachine> {
        self.virtual_machines
            .iter()
            .filter(move |v| v.parent_server_id == server_id)
    }
}

/// Get current timestamp in milliseconds since Unix epoch.
pub fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_defaults_to_online() {
        let snapshot = FleetSnapshot::default();
        assert_eq!(snapshot.overall, Status::Online);
        assert_eq!(snapshot.entity_count(), 0);
    }

    #[test]
    fn relation_lookups_by_id() {
        let a = Server::new("A");
        let b = Server::new("B");
        let snapshot = FleetSnapshot {
            services: vec![
                Service::new("one", a.id),
                Service::new("two", b.id),
                Service::new("three", a.id),
            ],
            virtual_machines: vec![VirtualMachine::new("VM-1", b.id)],
            servers: vec![a.clone(), b.clone()],
            ..Default::default()
        };

        assert_eq!(snapshot.services_on(a.id).count(), 2);
        assert_eq!(snapshot.vms_on(b.id).count(), 1);
        assert_eq!(snapshot.vms_on(a.id).count(), 0);
        assert_eq!(snapshot.server(b.id).map(|s| s.name.as_str()), Some("B"));
    }

    #[test]
    fn dangling_server_reference_is_no_match() {
        let gone = Server::new("removed");
        let snapshot = FleetSnapshot {
            services: vec![Service::new("orphan", gone.id)],
            ..Default::default()
        };
        assert!(snapshot.server(gone.id).is_none());
    }

    #[test]
    fn counts_include_device() {
        let mut device = LocalDevice::new("This Device", "https://1.1.1.1");
        device.status = Status::Warning;
        let snapshot = FleetSnapshot {
            servers: vec![Server::new("A")],
            device: Some(device),
            ..Default::default()
        };

        assert_eq!(snapshot.entity_count(), 2);
        assert_eq!(snapshot.count_by_status(Status::Warning), 1);
    }

    #[test]
    fn timestamp_is_recent() {
        assert!(current_timestamp_ms() > 1_600_000_000_000);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serializes_to_json_without_empty_device() {
        let snapshot = FleetSnapshot {
            servers: vec![Server::new("A")],
            ..Default::default()
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"servers\""));
        assert!(!json.contains("\"device\""));
        assert!(!json.contains("deep_test_progress"));
    }
}
