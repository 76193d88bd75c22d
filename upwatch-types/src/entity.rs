//! Monitored entities: servers, services, virtual machines and the local device.

use core::fmt;

use uuid::Uuid;

use crate::{
    ResourceMetrics, SampleHistory, Status, DEVICE_HISTORY_CAP, SIMULATED_HISTORY_CAP,
};

/// Stable identifier assigned when an entity is created.
///
/// Ids live for one simulation run. Regenerating mock data replaces
/// every entity, and with it every id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct EntityId(Uuid);

impl EntityId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for EntityId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Which collection an entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EntityKind {
    Server,
    Service,
    VirtualMachine,
    Device,
}

impl EntityKind {
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Server => "server",
            EntityKind::Service => "service",
            EntityKind::VirtualMachine => "vm",
            EntityKind::Device => "device",
        }
    }
}

/// Per-server notification preferences.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NotificationSettings {
    pub notify_on_offline: bool,
    pub notify_on_storage_warning: bool,
    /// Volume usage percentage above which a storage warning fires.
    pub storage_warning_threshold: f64,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            notify_on_offline: true,
            notify_on_storage_warning: false,
            storage_warning_threshold: 75.0,
        }
    }
}

/// Partial update for [`NotificationSettings`]; `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationUpdate {
    pub notify_on_offline: Option<bool>,
    pub notify_on_storage_warning: Option<bool>,
    pub storage_warning_threshold: Option<f64>,
}

impl NotificationUpdate {
    pub fn apply(&self, settings: &mut NotificationSettings) {
        if let Some(v) = self.notify_on_offline {
            settings.notify_on_offline = v;
        }
        if let Some(v) = self.notify_on_storage_warning {
            settings.notify_on_storage_warning = v;
        }
        if let Some(v) = self.storage_warning_threshold {
            settings.storage_warning_threshold = v;
        }
    }
}

/// A physical or virtual host.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Server {
    pub id: EntityId,
    pub name: String,
    pub status: Status,
    /// Latest raw latency in milliseconds; 0 marks a failed probe.
    pub latest_sample: f64,
    pub history: SampleHistory,
    pub resources: ResourceMetrics,
    pub notifications: NotificationSettings,
    pub ip_address: String,
    pub location: String,
    pub machine_type: String,
}

impl Server {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            status: Status::Online,
            latest_sample: 0.0,
            history: SampleHistory::new(SIMULATED_HISTORY_CAP),
            resources: ResourceMetrics::default(),
            notifications: NotificationSettings::default(),
            ip_address: String::new(),
            location: String::new(),
            machine_type: "Physical".to_string(),
        }
    }
}

/// A service running on a server.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Service {
    pub id: EntityId,
    pub name: String,
    /// Owning server. May dangle if that server was removed.
    pub server_id: EntityId,
    pub status: Status,
    pub latest_sample: f64,
    pub history: SampleHistory,
}

impl Service {
    pub fn new(name: impl Into<String>, server_id: EntityId) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            server_id,
            status: Status::Online,
            latest_sample: 0.0,
            history: SampleHistory::new(SIMULATED_HISTORY_CAP),
        }
    }
}

/// A virtual machine hosted on a server.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VirtualMachine {
    pub id: EntityId,
    pub name: String,
    pub parent_server_id: EntityId,
    pub status: Status,
    pub latest_sample: f64,
    pub history: SampleHistory,
    pub resources: ResourceMetrics,
    pub ip_address: String,
}

impl VirtualMachine {
    pub fn new(name: impl Into<String>, parent_server_id: EntityId) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            parent_server_id,
            status: Status::Online,
            latest_sample: 0.0,
            history: SampleHistory::new(SIMULATED_HISTORY_CAP),
            resources: ResourceMetrics::default(),
            ip_address: String::new(),
        }
    }
}

/// The device running the monitor, probed over the real network.
///
/// Resource metrics are not collected for the device and stay at zero.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocalDevice {
    pub id: EntityId,
    pub name: String,
    pub status: Status,
    pub latest_sample: f64,
    pub history: SampleHistory,
    pub resources: ResourceMetrics,
    /// Address the probe measures round-trip time against.
    pub probe_target: String,
}

impl LocalDevice {
    pub fn new(name: impl Into<String>, probe_target: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            status: Status::Online,
            latest_sample: 0.0,
            history: SampleHistory::new(DEVICE_HISTORY_CAP),
            resources: ResourceMetrics::unavailable(),
            probe_target: probe_target.into(),
        }
    }
}

/// Uniform access to the fields every monitored entity carries.
pub trait Monitored {
    fn id(&self) -> EntityId;
    fn name(&self) -> &str;
    fn kind(&self) -> EntityKind;
    fn status(&self) -> Status;
    fn set_status(&mut self, status: Status);
    fn latest_sample(&self) -> f64;
    fn set_latest_sample(&mut self, sample: f64);
    fn history(&self) -> &SampleHistory;
    fn history_mut(&mut self) -> &mut SampleHistory;

    /// Resource metrics, if this kind of entity has simulated ones.
    fn resources_mut(&mut self) -> Option<&mut ResourceMetrics>;

    /// Mark the entity down. Offline always carries a zero sample.
    fn take_offline(&mut self) {
        self.set_status(Status::Offline);
        self.set_latest_sample(0.0);
    }
}

macro_rules! impl_monitored {
    ($ty:ty, $kind:expr, |$s:ident| $resources:expr) => {
        impl Monitored for $ty {
            fn id(&self) -> EntityId {
                self.id
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn kind(&self) -> EntityKind {
                $kind
            }

            fn status(&self) -> Status {
                self.status
            }

            fn set_status(&mut self, status: Status) {
                self.status = status;
            }

            fn latest_sample(&self) -> f64 {
                self.latest_sample
            }

            fn set_latest_sample(&mut self, sample: f64) {
                self.latest_sample = sample;
            }

            fn history(&self) -> &SampleHistory {
                &self.history
            }

            fn history_mut(&mut self) -> &mut SampleHistory {
                &mut self.history
            }

            fn resources_mut(&mut self) -> Option<&mut ResourceMetrics> {
                let $s = self;
                $resources
            }
        }
    };
}

impl_monitored!(Server, EntityKind::Server, |s| Some(&mut s.resources));
impl_monitored!(Service, EntityKind::Service, |_s| None);
impl_monitored!(VirtualMachine, EntityKind::VirtualMachine, |s| Some(
    &mut s.resources
));
impl_monitored!(LocalDevice, EntityKind::Device, |_s| None);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = Server::new("a");
        let b = Server::new("a");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn simulated_entities_use_simulated_cap() {
        let server = Server::new("Web Server");
        let service = Service::new("Database", server.id);
        let vm = VirtualMachine::new("VM-1", server.id);

        assert_eq!(server.history.cap(), SIMULATED_HISTORY_CAP);
        assert_eq!(service.history.cap(), SIMULATED_HISTORY_CAP);
        assert_eq!(vm.history.cap(), SIMULATED_HISTORY_CAP);
    }

    #[test]
    fn device_uses_device_cap_and_no_resources() {
        let mut device = LocalDevice::new("This Device", "https://1.1.1.1");
        assert_eq!(device.history.cap(), DEVICE_HISTORY_CAP);
        assert!(device.resources_mut().is_none());
        assert_eq!(device.resources, ResourceMetrics::unavailable());
    }

    #[test]
    fn take_offline_zeroes_sample() {
        let server = Server::new("host");
        let mut service = Service::new("svc", server.id);
        service.latest_sample = 42.0;

        service.take_offline();

        assert_eq!(service.status, Status::Offline);
        assert_eq!(service.latest_sample, 0.0);
    }

    #[test]
    fn notification_update_applies_only_set_fields() {
        let mut settings = NotificationSettings::default();
        let update = NotificationUpdate {
            notify_on_storage_warning: Some(true),
            storage_warning_threshold: Some(90.0),
            ..Default::default()
        };

        update.apply(&mut settings);

        assert!(settings.notify_on_offline);
        assert!(settings.notify_on_storage_warning);
        assert_eq!(settings.storage_warning_threshold, 90.0);
    }

    #[test]
    fn kinds_report_their_collection() {
        let server = Server::new("s");
        assert_eq!(server.kind(), EntityKind::Server);
        assert_eq!(Service::new("x", server.id).kind(), EntityKind::Service);
        assert_eq!(EntityKind::VirtualMachine.label(), "vm");
    }
}
