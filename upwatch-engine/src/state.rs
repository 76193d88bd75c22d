//! Internal state management for the monitor.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use rand::rngs::StdRng;
use upwatch_types::{
    current_timestamp_ms, EntityId, FleetSnapshot, LatencyPoint, LocalDevice, Monitored, Server,
    Service, Status, VirtualMachine,
};

use crate::aggregator::{aggregate, Aggregate, AggregateInput};
use crate::collaborators::Notification;
use crate::mock::generate_fleet;
use crate::scenario::DeepTest;
use crate::telemetry::tick_entity;
use crate::SimulationCounts;

/// How far back the rolling latency log reaches.
pub const LATENCY_LOG_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Every monitored entity, owned in one place.
///
/// Relations between collections are id lookups; a service whose server
/// is gone simply finds no match.
#[derive(Debug, Clone, Default)]
pub struct Fleet {
    pub servers: Vec<Server>,
    pub services: Vec<Service>,
    pub virtual_machines: Vec<VirtualMachine>,
    pub device: Option<LocalDevice>,
}

impl Fleet {
    /// Simulated entities: servers, services and VMs. The device is
    /// excluded because its samples come from the probe.
    pub fn simulated(&self) -> impl Iterator<Item = &dyn Monitored> {
        self.servers
            .iter()
            .map(|s| s as &dyn Monitored)
            .chain(self.services.iter().map(|s| s as &dyn Monitored))
            .chain(self.virtual_machines.iter().map(|v| v as &dyn Monitored))
    }

    pub fn simulated_mut(&mut self) -> impl Iterator<Item = &mut dyn Monitored> {
        self.servers
            .iter_mut()
            .map(|s| s as &mut dyn Monitored)
            .chain(self.services.iter_mut().map(|s| s as &mut dyn Monitored))
            .chain(
                self.virtual_machines
                    .iter_mut()
                    .map(|v| v as &mut dyn Monitored),
            )
    }

    /// Every entity, the device included.
    pub fn all(&self) -> impl Iterator<Item = &dyn Monitored> {
        self.simulated()
            .chain(self.device.iter().map(|d| d as &dyn Monitored))
    }

    pub fn statuses(&self) -> Vec<Status> {
        self.all().map(|e| e.status()).collect()
    }

    pub fn samples(&self) -> Vec<f64> {
        self.all().map(|e| e.latest_sample()).collect()
    }

    pub fn server(&self, id: EntityId) -> Option<&Server> {
        self.servers.iter().find(|s| s.id == id)
    }

    pub fn server_mut(&mut self, id: EntityId) -> Option<&mut Server> {
        self.servers.iter_mut().find(|s| s.id == id)
    }

    /// Number of simulated entities.
    pub fn simulated_len(&self) -> usize {
        self.servers.len() + self.services.len() + self.virtual_machines.len()
    }
}

/// Rolling log of weighted latency, bounded by age.
#[derive(Debug, Clone)]
pub struct LatencyLog {
    points: VecDeque<LatencyPoint>,
    retention_ms: u64,
}

impl Default for LatencyLog {
    fn default() -> Self {
        Self::new(LATENCY_LOG_RETENTION)
    }
}

impl LatencyLog {
    pub fn new(retention: Duration) -> Self {
        Self {
            points: VecDeque::new(),
            retention_ms: retention.as_millis() as u64,
        }
    }

    /// Append a point and evict everything older than the retention.
    pub fn record(&mut self, point: LatencyPoint) {
        self.points.push_back(point);
        let cutoff = point.timestamp_ms.saturating_sub(self.retention_ms);
        while self
            .points
            .front()
            .is_some_and(|p| p.timestamp_ms < cutoff)
        {
            self.points.pop_front();
        }
    }

    /// Points within `window` of `now_ms`, oldest first.
    pub fn window(&self, now_ms: u64, window: Duration) -> Vec<LatencyPoint> {
        let cutoff = now_ms.saturating_sub(window.as_millis() as u64);
        self.points
            .iter()
            .filter(|p| p.timestamp_ms >= cutoff)
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Everything the monitor mutates. Guarded by a single mutex.
#[derive(Debug)]
pub struct MonitorState {
    pub fleet: Fleet,
    pub counts: SimulationCounts,
    pub simulation_enabled: bool,
    pub simulate_downtime: bool,
    pub simulate_warnings: bool,
    pub deep_test: Option<DeepTest>,
    /// Bumped whenever device monitoring stops so late probe results
    /// can be recognised and dropped.
    pub device_epoch: u64,
    pub overall: Status,
    pub weighted_latency: f64,
    /// Overall status last handed to the icon selector.
    pub last_published: Option<Status>,
    pub latency_log: LatencyLog,
    /// Servers already reported offline.
    pub offline_reported: HashSet<EntityId>,
    /// Servers already reported over their storage threshold.
    pub storage_reported: HashSet<EntityId>,
    pub rng: StdRng,
}

/// What a state refresh produced, to be dispatched outside the lock.
#[derive(Debug)]
pub struct Effects {
    pub snapshot: FleetSnapshot,
    pub status_changed: Option<Status>,
    pub notifications: Vec<Notification>,
}

impl MonitorState {
    pub fn new(counts: SimulationCounts, simulation_enabled: bool, rng: StdRng) -> Self {
        let mut state = Self {
            fleet: Fleet::default(),
            counts,
            simulation_enabled,
            simulate_downtime: false,
            simulate_warnings: false,
            deep_test: None,
            device_epoch: 0,
            overall: Status::Online,
            weighted_latency: 0.0,
            last_published: None,
            latency_log: LatencyLog::default(),
            offline_reported: HashSet::new(),
            storage_reported: HashSet::new(),
            rng,
        };
        if simulation_enabled {
            state.regenerate();
        }
        state
    }

    /// Replace every simulated entity, and with them every id.
    pub fn regenerate(&mut self) {
        let device = self.fleet.device.take();
        self.fleet = if self.simulation_enabled {
            generate_fleet(self.counts, &mut self.rng)
        } else {
            Fleet::default()
        };
        self.fleet.device = device;
        self.offline_reported.clear();
        self.storage_reported.clear();
    }

    /// One telemetry tick over all simulated entities.
    pub fn tick(&mut self) {
        if !self.simulation_enabled {
            return;
        }

        let Self { fleet, rng, .. } = self;
        for entity in fleet.simulated_mut() {
            tick_entity(entity, rng);
        }
        tracing::debug!(entities = self.fleet.simulated_len(), "tick");

        self.record_latency();
    }

    /// Append the current weighted latency to the rolling log.
    pub fn record_latency(&mut self) {
        let aggregate = self.aggregate();
        self.latency_log.record(LatencyPoint {
            timestamp_ms: current_timestamp_ms(),
            value: aggregate.weighted_latency,
        });
    }

    pub fn aggregate(&self) -> Aggregate {
        let statuses = self.fleet.statuses();
        let samples = self.fleet.samples();
        aggregate(AggregateInput {
            statuses: &statuses,
            samples: &samples,
            monitoring_enabled: self.simulation_enabled,
            device_active: self.fleet.device.is_some(),
        })
    }

    /// Recompute the overall status, collect notifications and build the
    /// snapshot to publish.
    pub fn refresh(&mut self) -> Effects {
        let aggregate = self.aggregate();
        self.overall = aggregate.status;
        self.weighted_latency = aggregate.weighted_latency;

        let status_changed = if self.last_published != Some(self.overall) {
            self.last_published = Some(self.overall);
            Some(self.overall)
        } else {
            None
        };

        let notifications = self.collect_notifications();

        Effects {
            snapshot: self.snapshot(),
            status_changed,
            notifications,
        }
    }

    /// Notifications for servers that newly went offline or newly crossed
    /// their storage threshold.
    fn collect_notifications(&mut self) -> Vec<Notification> {
        let mut notifications = Vec::new();

        let offline_now: HashSet<EntityId> = self
            .fleet
            .servers
            .iter()
            .filter(|s| s.status.is_offline())
            .map(|s| s.id)
            .collect();

        for server in &self.fleet.servers {
            if offline_now.contains(&server.id)
                && !self.offline_reported.contains(&server.id)
                && server.notifications.notify_on_offline
            {
                notifications.push(Notification::ServerOffline {
                    server_id: server.id,
                    name: server.name.clone(),
                });
            }
        }
        self.offline_reported = offline_now;

        let mut over_threshold = HashSet::new();
        for server in &self.fleet.servers {
            let settings = &server.notifications;
            if !settings.notify_on_storage_warning {
                continue;
            }
            let fullest = server
                .resources
                .volumes
                .iter()
                .max_by(|a, b| a.usage_percent().total_cmp(&b.usage_percent()));
            let Some(volume) = fullest else { continue };
            if volume.usage_percent() <= settings.storage_warning_threshold {
                continue;
            }

            over_threshold.insert(server.id);
            if !self.storage_reported.contains(&server.id) {
                notifications.push(Notification::StorageWarning {
                    server_id: server.id,
                    name: server.name.clone(),
                    volume: volume.name.clone(),
                    usage_percent: volume.usage_percent(),
                    threshold: settings.storage_warning_threshold,
                });
            }
        }
        self.storage_reported = over_threshold;

        notifications
    }

    pub fn snapshot(&self) -> FleetSnapshot {
        FleetSnapshot {
            timestamp_ms: current_timestamp_ms(),
            overall: self.overall,
            weighted_latency: self.weighted_latency,
            simulation_enabled: self.simulation_enabled,
            simulate_downtime: self.simulate_downtime,
            simulate_warnings: self.simulate_warnings,
            deep_test_progress: self.deep_test.as_ref().map(|d| d.progress()),
            servers: self.fleet.servers.clone(),
            services: self.fleet.services.clone(),
            virtual_machines: self.fleet.virtual_machines.clone(),
            device: self.fleet.device.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use upwatch_types::SIMULATED_HISTORY_CAP;

    fn state() -> MonitorState {
        MonitorState::new(
            SimulationCounts::new(2, 3, 1),
            true,
            StdRng::seed_from_u64(11),
        )
    }

    #[test]
    fn new_state_generates_fleet_when_enabled() {
        let s = state();
        assert_eq!(s.fleet.simulated_len(), 6);

        let disabled = MonitorState::new(SimulationCounts::default(), false, StdRng::seed_from_u64(1));
        assert_eq!(disabled.fleet.simulated_len(), 0);
    }

    #[test]
    fn tick_keeps_histories_bounded() {
        let mut s = state();
        for _ in 0..100 {
            s.tick();
        }
        for entity in s.fleet.simulated() {
            assert!(entity.history().len() <= SIMULATED_HISTORY_CAP);
        }
        assert_eq!(s.latency_log.len(), 100);
    }

    #[test]
    fn tick_skips_offline_entities() {
        let mut s = state();
        s.fleet.servers[0].take_offline();
        let before = s.fleet.servers[0].history.len();

        for _ in 0..5 {
            s.tick();
        }

        assert_eq!(s.fleet.servers[0].history.len(), before);
        assert_eq!(s.fleet.servers[0].latest_sample, 0.0);
    }

    #[test]
    fn regenerate_keeps_device() {
        let mut s = state();
        s.fleet.device = Some(LocalDevice::new("This Device", "https://1.1.1.1"));
        let old_ids: Vec<_> = s.fleet.servers.iter().map(|x| x.id).collect();

        s.regenerate();

        assert!(s.fleet.device.is_some());
        assert!(s.fleet.servers.iter().all(|x| !old_ids.contains(&x.id)));
    }

    #[test]
    fn refresh_reports_status_change_once() {
        let mut s = state();
        let first = s.refresh();
        assert_eq!(first.status_changed, Some(Status::Online));

        let second = s.refresh();
        assert_eq!(second.status_changed, None);

        s.fleet.services[0].take_offline();
        let third = s.refresh();
        assert_eq!(third.status_changed, Some(Status::Offline));
        assert_eq!(third.snapshot.overall, Status::Offline);
    }

    #[test]
    fn offline_notification_fires_on_transition_only() {
        let mut s = state();
        s.refresh();

        s.fleet.servers[0].take_offline();
        let effects = s.refresh();
        assert_eq!(effects.notifications.len(), 1);
        assert!(matches!(
            effects.notifications[0],
            Notification::ServerOffline { .. }
        ));

        // Still offline: no repeat
        assert!(s.refresh().notifications.is_empty());
    }

    #[test]
    fn offline_notification_respects_preference() {
        let mut s = state();
        s.fleet.servers[0].notifications.notify_on_offline = false;
        s.fleet.servers[0].take_offline();
        assert!(s.refresh().notifications.is_empty());
    }

    #[test]
    fn storage_warning_fires_once_per_crossing() {
        let mut s = state();
        let server = &mut s.fleet.servers[0];
        server.notifications.notify_on_storage_warning = true;
        server.notifications.storage_warning_threshold = 70.0;
        // Default System volume sits at 75%
        let effects = s.refresh();
        assert_eq!(effects.notifications.len(), 1);
        assert!(s.refresh().notifications.is_empty());

        s.fleet.servers[0].notifications.storage_warning_threshold = 95.0;
        assert!(s.refresh().notifications.is_empty());
        s.fleet.servers[0].notifications.storage_warning_threshold = 70.0;
        assert_eq!(s.refresh().notifications.len(), 1);
    }

    #[test]
    fn latency_log_evicts_old_points() {
        let mut log = LatencyLog::new(Duration::from_secs(60));
        log.record(LatencyPoint { timestamp_ms: 0, value: 1.0 });
        log.record(LatencyPoint { timestamp_ms: 30_000, value: 2.0 });
        log.record(LatencyPoint { timestamp_ms: 90_000, value: 3.0 });

        assert_eq!(log.len(), 2);
    }

    #[test]
    fn latency_log_window_filters_trailing_range() {
        let mut log = LatencyLog::default();
        for i in 0..10u64 {
            log.record(LatencyPoint {
                timestamp_ms: i * 1_000,
                value: i as f64,
            });
        }

        let recent = log.window(9_000, Duration::from_secs(3));
        let values: Vec<_> = recent.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![6.0, 7.0, 8.0, 9.0]);
    }
}
