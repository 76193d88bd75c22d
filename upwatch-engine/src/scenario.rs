//! Forced failure, warning and recovery scenarios.
//!
//! Everything here mutates a [`Fleet`] in place. Callers re-run the
//! aggregator afterwards.

use rand::seq::SliceRandom;
use rand::Rng;
use upwatch_types::{EntityId, Monitored, Status};

use crate::state::Fleet;
use crate::telemetry::{RESET_RANGE, WARNING_RANGE};

/// Chance that each server goes down in a random-error scenario.
pub const RANDOM_ERROR_PROBABILITY: f64 = 0.3;

/// Default progress increment per deep-test cycle.
pub const DEEP_TEST_STEP: f64 = 0.1;

/// Slack for floating point accumulation when wrapping progress.
const PROGRESS_EPSILON: f64 = 1e-9;

/// One deep-test scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    ResetAll,
    RandomWarning,
    RandomError,
    MixedStates,
    GradualRecovery,
}

impl Scenario {
    pub const ALL: [Scenario; 5] = [
        Scenario::ResetAll,
        Scenario::RandomWarning,
        Scenario::RandomError,
        Scenario::MixedStates,
        Scenario::GradualRecovery,
    ];

    /// Pick one scenario uniformly.
    pub fn pick<R: Rng + ?Sized>(rng: &mut R) -> Scenario {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Scenario::ResetAll => "reset-all",
            Scenario::RandomWarning => "random-warning",
            Scenario::RandomError => "random-error",
            Scenario::MixedStates => "mixed-states",
            Scenario::GradualRecovery => "gradual-recovery",
        }
    }

    pub fn apply<R: Rng + ?Sized>(&self, fleet: &mut Fleet, rng: &mut R) {
        match self {
            Scenario::ResetAll => reset_all(fleet, rng),
            Scenario::RandomWarning => force_random_warnings(fleet, rng),
            Scenario::RandomError => random_errors(fleet, rng),
            Scenario::MixedStates => mixed_states(fleet, rng),
            Scenario::GradualRecovery => gradual_recovery(fleet, rng),
        }
    }
}

/// Set every simulated entity Online with a fresh sample, filling empty
/// histories with that sample.
pub fn reset_all<R: Rng + ?Sized>(fleet: &mut Fleet, rng: &mut R) {
    for entity in fleet.simulated_mut() {
        let sample = rng.gen_range(RESET_RANGE);
        entity.set_status(Status::Online);
        entity.set_latest_sample(sample);
        if entity.history().is_empty() {
            entity.history_mut().fill(sample);
        }
    }
}

/// Return warned entities to Online with a fresh sample.
pub fn clear_warnings<R: Rng + ?Sized>(fleet: &mut Fleet, rng: &mut R) {
    for entity in fleet.simulated_mut() {
        if entity.status() == Status::Warning {
            entity.set_status(Status::Online);
            entity.set_latest_sample(rng.gen_range(RESET_RANGE));
        }
    }
}

fn force_warning<E: Monitored + ?Sized, R: Rng + ?Sized>(entity: &mut E, rng: &mut R) {
    entity.set_status(Status::Warning);
    entity.set_latest_sample(rng.gen_range(WARNING_RANGE));
}

/// Force one random non-offline entity per category into Warning.
pub fn force_random_warnings<R: Rng + ?Sized>(fleet: &mut Fleet, rng: &mut R) {
    if let Some(server) = pick_live(&mut fleet.servers, rng) {
        force_warning(server, rng);
    }
    if let Some(service) = pick_live(&mut fleet.services, rng) {
        force_warning(service, rng);
    }
    if let Some(vm) = pick_live(&mut fleet.virtual_machines, rng) {
        force_warning(vm, rng);
    }
}

fn pick_live<'a, E: Monitored, R: Rng + ?Sized>(
    entities: &'a mut [E],
    rng: &mut R,
) -> Option<&'a mut E> {
    let live: Vec<usize> = entities
        .iter()
        .enumerate()
        .filter(|(_, e)| !e.status().is_offline())
        .map(|(i, _)| i)
        .collect();
    let index = *live.choose(rng)?;
    entities.get_mut(index)
}

/// Take a server down together with everything it hosts.
///
/// Returns how many entities were forced Offline, 0 if the server is
/// unknown.
pub fn cascade_offline(fleet: &mut Fleet, server_id: EntityId) -> usize {
    let Some(server) = fleet.server_mut(server_id) else {
        return 0;
    };
    server.take_offline();
    let mut count = 1;

    for service in fleet.services.iter_mut().filter(|s| s.server_id == server_id) {
        service.take_offline();
        count += 1;
    }
    for vm in fleet
        .virtual_machines
        .iter_mut()
        .filter(|v| v.parent_server_id == server_id)
    {
        vm.take_offline();
        count += 1;
    }

    count
}

/// Pick one server at random and cascade it offline.
pub fn random_downtime<R: Rng + ?Sized>(fleet: &mut Fleet, rng: &mut R) -> Option<EntityId> {
    let id = fleet.servers.choose(rng)?.id;
    cascade_offline(fleet, id);
    Some(id)
}

/// Cascade each server offline with [`RANDOM_ERROR_PROBABILITY`], making
/// sure at least one goes down when any exist.
pub fn random_errors<R: Rng + ?Sized>(fleet: &mut Fleet, rng: &mut R) {
    let doomed: Vec<EntityId> = fleet
        .servers
        .iter()
        .filter(|_| rng.gen_bool(RANDOM_ERROR_PROBABILITY))
        .map(|s| s.id)
        .collect();

    if doomed.is_empty() {
        random_downtime(fleet, rng);
        return;
    }
    for id in doomed {
        cascade_offline(fleet, id);
    }
}

/// Assign every entity an independent random status. Offline entities get
/// a zero sample, the others a sample from their status range.
pub fn mixed_states<R: Rng + ?Sized>(fleet: &mut Fleet, rng: &mut R) {
    for entity in fleet.simulated_mut() {
        match Status::ALL[rng.gen_range(0..Status::ALL.len())] {
            Status::Online => {
                entity.set_status(Status::Online);
                entity.set_latest_sample(rng.gen_range(RESET_RANGE));
            }
            Status::Warning => force_warning(entity, rng),
            Status::Offline => entity.take_offline(),
        }
    }
}

/// Move every entity one step towards health: Offline to Warning,
/// Warning to Online.
pub fn gradual_recovery<R: Rng + ?Sized>(fleet: &mut Fleet, rng: &mut R) {
    for entity in fleet.simulated_mut() {
        match entity.status() {
            Status::Offline => force_warning(entity, rng),
            Status::Warning => {
                entity.set_status(Status::Online);
                entity.set_latest_sample(rng.gen_range(RESET_RANGE));
            }
            Status::Online => {}
        }
    }
}

/// Cyclic deep-test driver state.
#[derive(Debug, Clone)]
pub struct DeepTest {
    progress: f64,
    step: f64,
    cycles: u64,
    last: Option<Scenario>,
}

impl Default for DeepTest {
    fn default() -> Self {
        Self::new(DEEP_TEST_STEP)
    }
}

impl DeepTest {
    pub fn new(step: f64) -> Self {
        Self {
            progress: 0.0,
            step,
            cycles: 0,
            last: None,
        }
    }

    /// Progress through the current cycle, always in `[0, 1)`.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn last_scenario(&self) -> Option<Scenario> {
        self.last
    }

    /// Run one cycle: pick and apply a scenario, then advance progress.
    pub fn cycle<R: Rng + ?Sized>(&mut self, fleet: &mut Fleet, rng: &mut R) -> Scenario {
        let scenario = Scenario::pick(rng);
        scenario.apply(fleet, rng);
        self.last = Some(scenario);
        self.cycles += 1;
        self.advance();
        scenario
    }

    /// Advance progress by one step, wrapping to 0 at 1.0.
    pub fn advance(&mut self) -> f64 {
        self.progress += self.step;
        if self.progress >= 1.0 - PROGRESS_EPSILON {
            self.progress = 0.0;
        }
        self.progress
    }
}
