//! The Monitor: owns all fleet state and drives it from background timers.

use std::fmt::{self, Write as _};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use upwatch_types::{
    current_timestamp_ms, EntityId, FleetSnapshot, LatencyPoint, LocalDevice,
    NotificationUpdate, Status,
};

use crate::collaborators::{
    IconSelector, Notification, Notifier, TracingIconSelector, TracingNotifier,
};
use crate::output::Output;
use crate::probe::{apply_probe_result, HttpProbe, LatencyProbe};
use crate::scenario::{self, DeepTest, Scenario};
use crate::state::{Effects, MonitorState};
use crate::{MonitorConfig, ProbeError, SimulationCounts};

/// The main entry point for simulated fleet monitoring.
///
/// A Monitor owns every entity collection behind a single lock. Periodic
/// timers (entity tick, device probe, warning rotation, deep test) and
/// direct commands all mutate state through that lock, so no two updates
/// ever interleave. After each mutation the overall status is recomputed
/// and a fresh [`FleetSnapshot`] is published to subscribers.
///
/// Cloning is cheap and every clone drives the same state.
///
/// # Example
///
/// ```rust,no_run
/// use upwatch_engine::{Monitor, MonitorConfig, Output};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let monitor = Monitor::builder()
///         .config(MonitorConfig::default())
///         .output(Output::file("fleet.json"))
///         .build();
///
///     // Tick every 2 seconds in the background
///     monitor.start();
///     monitor.start_device_monitoring();
///
///     let mut updates = monitor.subscribe();
///     while updates.changed().await.is_ok() {
///         let snapshot = updates.borrow().clone();
///         println!("{} ({:.1} ms)", snapshot.overall, snapshot.weighted_latency);
///     }
/// }
/// ```
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<MonitorState>,
    /// Held from computing effects until they are dispatched, so
    /// collaborators and subscribers see updates in mutation order.
    /// Always taken before `state`.
    publishing: Mutex<()>,
    timers: Mutex<Timers>,
    config: MonitorConfig,
    probe: Arc<dyn LatencyProbe>,
    notifier: Arc<dyn Notifier>,
    icons: Arc<dyn IconSelector>,
    notifications_allowed: bool,
    dynamic_icon: AtomicBool,
    outputs: Vec<Output>,
    published: watch::Sender<FleetSnapshot>,
}

#[derive(Default)]
struct Timers {
    tick: Option<TimerHandle>,
    device: Option<TimerHandle>,
    warning: Option<TimerHandle>,
    deep_test: Option<TimerHandle>,
}

impl Timers {
    fn slot(&mut self, kind: TimerKind) -> &mut Option<TimerHandle> {
        match kind {
            TimerKind::Tick => &mut self.tick,
            TimerKind::Device => &mut self.device,
            TimerKind::Warning => &mut self.warning,
            TimerKind::DeepTest => &mut self.deep_test,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Tick,
    Device,
    Warning,
    DeepTest,
}

impl TimerKind {
    fn label(&self) -> &'static str {
        match self {
            TimerKind::Tick => "tick",
            TimerKind::Device => "device",
            TimerKind::Warning => "warning",
            TimerKind::DeepTest => "deep-test",
        }
    }
}

/// Handle for a background timer.
///
/// Dropping the handle stops the timer and cancels whatever the timer
/// task is awaiting, an in-flight probe included.
struct TimerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
        self.task.abort();
    }
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("config", &self.inner.config)
            .field("probe", &self.inner.probe)
            .field("outputs", &self.inner.outputs)
            .finish_non_exhaustive()
    }
}

impl Monitor {
    /// Create a monitor with the given config and default collaborators.
    pub fn new(config: MonitorConfig) -> Self {
        Self::builder().config(config).build()
    }

    /// Create a builder for configuring the monitor.
    pub fn builder() -> MonitorBuilder {
        MonitorBuilder::new()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    /// Start the periodic entity tick.
    ///
    /// Requires a tokio runtime. Starting again restarts the timer.
    pub fn start(&self) {
        self.start_timer(TimerKind::Tick, self.inner.config.tick_interval, false);
    }

    /// Stop the periodic entity tick.
    pub fn stop(&self) {
        self.stop_timer(TimerKind::Tick);
    }

    pub fn is_running(&self) -> bool {
        self.inner.timers.lock().tick.is_some()
    }

    /// Advance telemetry by one tick.
    ///
    /// The background timer calls this, and so can an external scheduler
    /// that wants ticks while the process is otherwise idle.
    pub fn tick(&self) {
        self.inner.mutate(|state| state.tick());
    }

    /// Replace all simulated entities with freshly generated ones.
    pub fn regenerate(&self, counts: SimulationCounts) {
        tracing::info!(
            servers = counts.servers,
            services = counts.services,
            vms = counts.virtual_machines,
            "regenerating mock data"
        );
        self.inner.mutate(|state| {
            state.counts = counts;
            state.regenerate();
        });
    }

    /// Turn simulated telemetry on or off.
    ///
    /// Turning it off clears every simulated entity and stops the warning
    /// and deep-test drivers. Turning it on regenerates the fleet.
    pub fn set_simulation_enabled(&self, enabled: bool) {
        if !enabled {
            self.stop_timer(TimerKind::Warning);
            self.stop_timer(TimerKind::DeepTest);
        }
        let changed = self.inner.mutate(|state| {
            if state.simulation_enabled == enabled {
                return false;
            }
            state.simulation_enabled = enabled;
            if !enabled {
                state.simulate_downtime = false;
                state.simulate_warnings = false;
                state.deep_test = None;
            }
            state.regenerate();
            true
        });
        if changed {
            tracing::info!(enabled, "simulation toggled");
        }
    }

    /// Toggle simulated downtime.
    ///
    /// Enabling takes one random server down together with everything it
    /// hosts. Disabling resets every entity to Online, unless simulated
    /// warnings are still on.
    pub fn set_simulate_downtime(&self, enabled: bool) {
        self.inner.mutate(|state| {
            state.simulate_downtime = enabled;
            if enabled {
                match scenario::random_downtime(&mut state.fleet, &mut state.rng) {
                    Some(id) => tracing::info!(server = %id, "simulated downtime"),
                    None => tracing::debug!("no servers to take down"),
                }
            } else if !state.simulate_warnings {
                scenario::reset_all(&mut state.fleet, &mut state.rng);
            }
        });
    }

    /// Toggle simulated warnings.
    ///
    /// Enabling forces one entity per category into Warning right away and
    /// then moves the warnings to other entities on the warning interval.
    /// Enabling again while already on changes nothing.
    pub fn set_simulate_warnings(&self, enabled: bool) {
        let unchanged = self.inner.mutate(|state| {
            if enabled && state.simulate_warnings {
                return true;
            }
            state.simulate_warnings = enabled;
            if enabled {
                scenario::force_random_warnings(&mut state.fleet, &mut state.rng);
            } else if state.simulate_downtime {
                scenario::clear_warnings(&mut state.fleet, &mut state.rng);
            } else {
                scenario::reset_all(&mut state.fleet, &mut state.rng);
            }
            false
        });
        if unchanged {
            return;
        }

        if enabled {
            self.start_timer(TimerKind::Warning, self.inner.config.warning_interval, false);
        } else {
            self.stop_timer(TimerKind::Warning);
        }
    }

    /// Start the cyclic deep test on freshly generated mock data.
    pub fn start_deep_test(&self) {
        let step = self.inner.config.deep_test_step;
        self.inner.mutate(|state| {
            state.regenerate();
            state.deep_test = Some(DeepTest::new(step));
        });
        tracing::info!("deep test started");
        self.start_timer(TimerKind::DeepTest, self.inner.config.deep_test_interval, false);
    }

    /// Stop the deep test and restore normal mock data.
    pub fn stop_deep_test(&self) {
        self.stop_timer(TimerKind::DeepTest);
        let was_running = self.inner.mutate(|state| {
            let was_running = state.deep_test.take().is_some();
            if was_running {
                state.regenerate();
            }
            was_running
        });
        if was_running {
            tracing::info!("deep test stopped");
        }
    }

    /// Run one deep-test cycle now. Returns `None` when no deep test is
    /// active.
    pub fn deep_test_step(&self) -> Option<Scenario> {
        self.inner.deep_test_cycle()
    }

    /// Progress of the active deep test, in `[0, 1)`.
    pub fn deep_test_progress(&self) -> Option<f64> {
        self.inner.state.lock().deep_test.as_ref().map(|d| d.progress())
    }

    /// Add the local device and start probing it.
    ///
    /// The first probe runs immediately.
    pub fn start_device_monitoring(&self) {
        let name = self.inner.config.device_name.clone();
        let target = self.inner.probe.target().to_string();
        self.inner.mutate(|state| {
            if state.fleet.device.is_none() {
                state.fleet.device = Some(LocalDevice::new(name, target));
            }
        });
        self.start_timer(TimerKind::Device, self.inner.config.device_interval, true);
    }

    /// Stop probing and remove the device.
    ///
    /// A probe that is still in flight resolves into nothing.
    pub fn stop_device_monitoring(&self) {
        self.stop_timer(TimerKind::Device);
        self.inner.mutate(|state| {
            state.device_epoch += 1;
            state.fleet.device = None;
        });
    }

    /// Probe the device once and apply the result.
    ///
    /// Returns the recorded sample, or `None` if device monitoring is off
    /// or was stopped while the probe was in flight.
    pub async fn probe_device(&self) -> Option<f64> {
        self.inner.probe_device().await
    }

    /// Apply a partial update to one server's notification preferences.
    ///
    /// Returns `false` if no server has this id.
    pub fn update_server_notification_settings(
        &self,
        server_id: EntityId,
        update: NotificationUpdate,
    ) -> bool {
        self.inner.mutate(|state| match state.fleet.server_mut(server_id) {
            Some(server) => {
                update.apply(&mut server.notifications);
                true
            }
            None => false,
        })
    }

    /// Weighted latency points recorded within the trailing `window`,
    /// oldest first.
    pub fn latency_history(&self, window: Duration) -> Vec<LatencyPoint> {
        self.inner
            .state
            .lock()
            .latency_log
            .window(current_timestamp_ms(), window)
    }

    /// Current state of the whole fleet.
    pub fn snapshot(&self) -> FleetSnapshot {
        self.inner.state.lock().snapshot()
    }

    pub fn overall_status(&self) -> Status {
        self.inner.state.lock().overall
    }

    pub fn weighted_latency(&self) -> f64 {
        self.inner.state.lock().weighted_latency
    }

    /// Receive every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<FleetSnapshot> {
        self.inner.published.subscribe()
    }

    /// Forward the overall status to the icon selector, or ask it for the
    /// default icon when disabled.
    pub fn set_dynamic_icon(&self, enabled: bool) {
        let _publishing = self.inner.publishing.lock();
        self.inner.dynamic_icon.store(enabled, Ordering::Relaxed);
        let icon = enabled.then(|| self.overall_status());
        self.inner.icons.select_icon(icon);
    }

    /// Send a test notification. Returns `false` if permission was denied.
    pub fn test_notification(&self) -> bool {
        if !self.inner.notifications_allowed {
            return false;
        }
        self.inner.notifier.notify(Notification::Test);
        true
    }

    /// Emit the current snapshot to all outputs immediately.
    pub async fn emit_now(&self) {
        self.inner.emit_outputs().await;
    }

    /// Human-readable dump of the monitor state.
    pub fn debug_report(&self) -> String {
        let running: Vec<&str> = {
            let mut timers = self.inner.timers.lock();
            [
                TimerKind::Tick,
                TimerKind::Device,
                TimerKind::Warning,
                TimerKind::DeepTest,
            ]
            .into_iter()
            .filter(|kind| timers.slot(*kind).is_some())
            .map(|kind| kind.label())
            .collect()
        };

        let state = self.inner.state.lock();
        let fleet = &state.fleet;
        let mut out = String::new();

        let _ = writeln!(out, "=== upwatch debug report ===");
        let _ = writeln!(
            out,
            "overall: {} (weighted latency {:.1} ms)",
            state.overall, state.weighted_latency
        );
        let _ = writeln!(
            out,
            "simulation: {} | downtime: {} | warnings: {}",
            state.simulation_enabled, state.simulate_downtime, state.simulate_warnings
        );
        if let Some(deep) = &state.deep_test {
            let _ = writeln!(
                out,
                "deep test: cycle {} progress {:.0}% last {}",
                deep.cycles(),
                deep.progress() * 100.0,
                deep.last_scenario().map_or("-", |s| s.label())
            );
        }
        let _ = writeln!(
            out,
            "timers: {}",
            if running.is_empty() {
                "none".to_string()
            } else {
                running.join(", ")
            }
        );
        let _ = writeln!(
            out,
            "servers: {} | services: {} | vms: {}",
            fleet.servers.len(),
            fleet.services.len(),
            fleet.virtual_machines.len()
        );
        for status in Status::ALL {
            let count = fleet.all().filter(|e| e.status() == status).count();
            let _ = writeln!(out, "  {:<5} {}", status.symbol(), count);
        }

        let _ = writeln!(out, "--- servers ---");
        for server in &fleet.servers {
            let _ = writeln!(
                out,
                "{:<4} {:<20} {:<15} {:>6.1} ms  cpu {:>5.1}%  mem {:>5.1}%",
                server.status.symbol(),
                server.name,
                server.ip_address,
                server.latest_sample,
                server.resources.cpu,
                server.resources.memory
            );
        }
        let _ = writeln!(out, "--- services ---");
        for service in &fleet.services {
            let host = fleet.server(service.server_id).map_or("?", |s| s.name.as_str());
            let _ = writeln!(
                out,
                "{:<4} {:<20} {:>6.1} ms  on {}",
                service.status.symbol(),
                service.name,
                service.latest_sample,
                host
            );
        }
        let _ = writeln!(out, "--- vms ---");
        for vm in &fleet.virtual_machines {
            let _ = writeln!(
                out,
                "{:<4} {:<20} {:<15} {:>6.1} ms  cpu {:>5.1}%  mem {:>5.1}%",
                vm.status.symbol(),
                vm.name,
                vm.ip_address,
                vm.latest_sample,
                vm.resources.cpu,
                vm.resources.memory
            );
        }
        match &fleet.device {
            Some(device) => {
                let _ = writeln!(
                    out,
                    "device: {} {} {:.1} ms via {}",
                    device.name, device.status, device.latest_sample, device.probe_target
                );
            }
            None => {
                let _ = writeln!(out, "device: not monitored");
            }
        }
        let _ = writeln!(out, "latency log: {} points", state.latency_log.len());
        let _ = writeln!(
            out,
            "notifications: {}",
            if self.inner.notifications_allowed {
                "allowed"
            } else {
                "denied"
            }
        );
        out
    }

    /// Stop every background timer.
    pub fn shutdown(&self) {
        let mut timers = self.inner.timers.lock();
        *timers = Timers::default();
        tracing::info!("monitor timers stopped");
    }

    /// Start a timer, replacing one of the same kind that is already running.
    fn start_timer(&self, kind: TimerKind, period: Duration, immediate: bool) {
        let handle = spawn_timer(&self.inner, kind, period, immediate);
        let _previous = std::mem::replace(self.inner.timers.lock().slot(kind), handle);
    }

    fn stop_timer(&self, kind: TimerKind) {
        let handle = self.inner.timers.lock().slot(kind).take();
        if handle.is_some() {
            tracing::info!(timer = kind.label(), "timer stopped");
        }
    }
}

impl Inner {
    /// Mutate state under the lock, then publish the result outside it.
    ///
    /// Collaborators are called with the publish lock held and must not
    /// call back into the monitor.
    fn mutate<T>(&self, f: impl FnOnce(&mut MonitorState) -> T) -> T {
        let _publishing = self.publishing.lock();
        let (out, effects) = {
            let mut state = self.state.lock();
            let out = f(&mut state);
            (out, state.refresh())
        };
        self.publish(effects);
        out
    }

    fn publish(&self, effects: Effects) {
        let Effects {
            snapshot,
            status_changed,
            notifications,
        } = effects;

        if let Some(status) = status_changed {
            tracing::info!(
                %status,
                weighted_latency = snapshot.weighted_latency,
                "overall status changed"
            );
            if self.dynamic_icon.load(Ordering::Relaxed) {
                self.icons.select_icon(Some(status));
            }
        }

        if self.notifications_allowed {
            for notification in notifications {
                self.notifier.notify(notification);
            }
        } else if !notifications.is_empty() {
            tracing::debug!(
                dropped = notifications.len(),
                "notification permission denied"
            );
        }

        self.published.send_replace(snapshot);
    }

    fn rotate_warnings(&self) {
        self.mutate(|state| {
            if !state.simulate_warnings {
                return;
            }
            let MonitorState { fleet, rng, .. } = state;
            scenario::clear_warnings(fleet, rng);
            scenario::force_random_warnings(fleet, rng);
        });
    }

    fn deep_test_cycle(&self) -> Option<Scenario> {
        let scenario = self.mutate(|state| {
            let MonitorState {
                deep_test,
                fleet,
                rng,
                ..
            } = state;
            deep_test.as_mut().map(|deep| deep.cycle(fleet, rng))
        })?;
        tracing::debug!(scenario = scenario.label(), "deep test cycle");
        Some(scenario)
    }

    async fn probe_device(&self) -> Option<f64> {
        let epoch = {
            let state = self.state.lock();
            state.fleet.device.as_ref()?;
            state.device_epoch
        };

        let result = match tokio::time::timeout(self.config.probe_timeout, self.probe.measure())
            .await
        {
            Ok(result) => result,
            Err(elapsed) => Err(ProbeError::from(elapsed)),
        };

        let _publishing = self.publishing.lock();
        let (sample, effects) = {
            let mut state = self.state.lock();
            if state.device_epoch != epoch {
                tracing::debug!("discarding probe result from stopped monitor");
                return None;
            }
            let device = state.fleet.device.as_mut()?;
            let sample = apply_probe_result(device, result);
            tracing::debug!(sample, "device probe");
            state.record_latency();
            (sample, state.refresh())
        };
        self.publish(effects);
        Some(sample)
    }

    async fn emit_outputs(&self) {
        if self.outputs.is_empty() {
            return;
        }
        let snapshot = self.published.borrow().clone();
        for output in &self.outputs {
            if let Err(err) = output.emit(&snapshot).await {
                tracing::warn!(error = %err, "failed to emit snapshot");
            }
        }
    }
}

fn spawn_timer(
    inner: &Arc<Inner>,
    kind: TimerKind,
    period: Duration,
    immediate: bool,
) -> Option<TimerHandle> {
    if period.is_zero() {
        tracing::warn!(timer = kind.label(), "zero period, timer not started");
        return None;
    }

    let runtime = match Handle::try_current() {
        Ok(runtime) => runtime,
        Err(_) => {
            tracing::warn!(timer = kind.label(), "no tokio runtime, timer not started");
            return None;
        }
    };

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let weak: Weak<Inner> = Arc::downgrade(inner);

    let task = runtime.spawn(async move {
        let start = if immediate {
            Instant::now()
        } else {
            Instant::now() + period
        };
        let mut timer = interval_at(start, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let Some(inner) = weak.upgrade() else { break };
                    match kind {
                        TimerKind::Tick => {
                            inner.mutate(|state| state.tick());
                            inner.emit_outputs().await;
                        }
                        TimerKind::Device => {
                            inner.probe_device().await;
                        }
                        TimerKind::Warning => inner.rotate_warnings(),
                        TimerKind::DeepTest => {
                            inner.deep_test_cycle();
                        }
                    }
                }
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }
    });

    tracing::info!(timer = kind.label(), ?period, "timer started");
    Some(TimerHandle { stop_tx, task })
}

/// Builder for configuring a Monitor.
#[derive(Default)]
pub struct MonitorBuilder {
    config: Option<MonitorConfig>,
    probe: Option<Arc<dyn LatencyProbe>>,
    notifier: Option<Arc<dyn Notifier>>,
    icons: Option<Arc<dyn IconSelector>>,
    outputs: Vec<Output>,
    seed: Option<u64>,
}

impl MonitorBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: MonitorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a custom device probe instead of HTTPS.
    pub fn probe(mut self, probe: Arc<dyn LatencyProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn icon_selector(mut self, icons: Arc<dyn IconSelector>) -> Self {
        self.icons = Some(icons);
        self
    }

    /// Add an output destination.
    ///
    /// Multiple outputs can be added; every tick is emitted to all of them.
    pub fn output(mut self, output: Output) -> Self {
        self.outputs.push(output);
        self
    }

    /// Seed the random source for reproducible runs.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build the monitor.
    ///
    /// Asks the notifier for permission once. Generates the initial fleet
    /// when simulation is enabled.
    pub fn build(self) -> Monitor {
        let config = self.config.unwrap_or_default();
        let probe = self.probe.unwrap_or_else(|| {
            Arc::new(HttpProbe::new(config.probe_url.clone(), config.probe_timeout))
        });
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(TracingNotifier));
        let icons = self
            .icons
            .unwrap_or_else(|| Arc::new(TracingIconSelector));

        let notifications_allowed = notifier.request_permission();
        if !notifications_allowed {
            tracing::warn!("notification permission denied");
        }

        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut state = MonitorState::new(config.counts, config.simulation_enabled, rng);
        let initial = state.refresh();

        let dynamic_icon = config.dynamic_icon;
        icons.select_icon(dynamic_icon.then_some(initial.snapshot.overall));

        let (published, _) = watch::channel(initial.snapshot);

        Monitor {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                publishing: Mutex::new(()),
                timers: Mutex::new(Timers::default()),
                config,
                probe,
                notifier,
                icons,
                notifications_allowed,
                dynamic_icon: AtomicBool::new(dynamic_icon),
                outputs: self.outputs,
                published,
            }),
        }
    }
}
