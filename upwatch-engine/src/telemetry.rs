//! Synthetic latency and resource telemetry.
//!
//! Each tick, every entity that is not Offline draws a raw latency sample
//! from a range picked by its current status. The raw value becomes the
//! entity's current reading while the smoothed value goes into history,
//! so the stored history lags the live sample.

use std::ops::RangeInclusive;

use rand::Rng;
use upwatch_types::{clamp_percent, Monitored, ResourceMetrics, Status};

/// Sample range for entities in Warning.
pub const WARNING_RANGE: RangeInclusive<f64> = 100.0..=200.0;

/// Sample range for healthy entities.
pub const ONLINE_RANGE: RangeInclusive<f64> = 2.0..=50.0;

/// Sample range used when statuses are reset.
pub const RESET_RANGE: RangeInclusive<f64> = 5.0..=50.0;

/// Maximum CPU drift per tick, in percentage points.
pub const CPU_JITTER: f64 = 10.0;

/// Maximum memory drift per tick, in percentage points.
pub const MEMORY_JITTER: f64 = 5.0;

/// Maximum storage drift per tick, in GB.
pub const STORAGE_JITTER: f64 = 10.0;

/// Range a new sample is drawn from, or `None` for Offline entities.
pub fn sample_range(status: Status) -> Option<RangeInclusive<f64>> {
    match status {
        Status::Online => Some(ONLINE_RANGE),
        Status::Warning => Some(WARNING_RANGE),
        Status::Offline => None,
    }
}

/// Draw a sample for `status`, recording it as the latest reading and
/// appending its smoothed value to history.
///
/// Offline entities are skipped: no sample, no history entry. Returns the
/// raw sample when one was taken.
pub fn advance_latency<E, R>(entity: &mut E, rng: &mut R) -> Option<f64>
where
    E: Monitored + ?Sized,
    R: Rng + ?Sized,
{
    let range = sample_range(entity.status())?;
    let raw = rng.gen_range(range);
    record_sample(entity, raw);
    Some(raw)
}

/// Record an externally measured raw sample.
pub fn record_sample<E: Monitored + ?Sized>(entity: &mut E, raw: f64) {
    entity.set_latest_sample(raw);
    entity.history_mut().push_smoothed(raw);
}

/// Apply one tick of bounded random drift to resource metrics.
pub fn perturb_resources<R: Rng + ?Sized>(resources: &mut ResourceMetrics, rng: &mut R) {
    resources.cpu = clamp_percent(resources.cpu + rng.gen_range(-CPU_JITTER..=CPU_JITTER));
    resources.memory =
        clamp_percent(resources.memory + rng.gen_range(-MEMORY_JITTER..=MEMORY_JITTER));

    for volume in &mut resources.volumes {
        let drift = rng.gen_range(-STORAGE_JITTER..=STORAGE_JITTER);
        volume.used = (volume.used + drift).clamp(0.0, volume.total);
    }
}

/// Advance one simulated entity by a full tick: latency first, then
/// resources, which drift regardless of status.
pub fn tick_entity<E, R>(entity: &mut E, rng: &mut R)
where
    E: Monitored + ?Sized,
    R: Rng + ?Sized,
{
    advance_latency(entity, rng);
    if let Some(resources) = entity.resources_mut() {
        perturb_resources(resources, rng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use upwatch_types::{Server, Service, StorageVolume, SIMULATED_HISTORY_CAP};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn online_samples_fall_in_online_range() {
        let mut rng = rng();
        let mut server = Server::new("web");

        for _ in 0..100 {
            let raw = advance_latency(&mut server, &mut rng).unwrap();
            assert!(ONLINE_RANGE.contains(&raw));
            assert_eq!(server.latest_sample, raw);
        }
    }

    #[test]
    fn warning_samples_fall_in_warning_range() {
        let mut rng = rng();
        let mut server = Server::new("web");
        server.status = Status::Warning;

        for _ in 0..100 {
            let raw = advance_latency(&mut server, &mut rng).unwrap();
            assert!(WARNING_RANGE.contains(&raw));
        }
    }

    #[test]
    fn first_sample_stored_raw_then_smoothed() {
        let mut rng = rng();
        let mut service = Service::new("db", Server::new("host").id);

        let first = advance_latency(&mut service, &mut rng).unwrap();
        assert_eq!(service.history.last(), Some(first));

        let previous = service.history.last().unwrap();
        let raw = advance_latency(&mut service, &mut rng).unwrap();
        let expected = 0.7 * previous + 0.3 * raw;
        assert!((service.history.last().unwrap() - expected).abs() < 1e-9);
        // Latest reading is the raw value, not the smoothed one
        assert_eq!(service.latest_sample, raw);
    }

    #[test]
    fn history_never_exceeds_cap() {
        let mut rng = rng();
        let mut server = Server::new("web");

        for _ in 0..(SIMULATED_HISTORY_CAP * 3) {
            tick_entity(&mut server, &mut rng);
            assert!(server.history.len() <= SIMULATED_HISTORY_CAP);
        }
        assert_eq!(server.history.len(), SIMULATED_HISTORY_CAP);
    }

    #[test]
    fn offline_entities_are_skipped() {
        let mut rng = rng();
        let mut server = Server::new("web");
        server.history.push(20.0);
        server.take_offline();

        for _ in 0..10 {
            assert!(advance_latency(&mut server, &mut rng).is_none());
        }

        assert_eq!(server.latest_sample, 0.0);
        assert_eq!(server.history.len(), 1);
    }

    #[test]
    fn resources_drift_within_bounds() {
        let mut rng = rng();
        let mut resources = ResourceMetrics::new(
            99.0,
            1.0,
            vec![
                StorageVolume::new("System", 512.0, 508.0),
                StorageVolume::new("Data", 1024.0, 3.0),
            ],
        );

        for _ in 0..500 {
            let before = resources.clone();
            perturb_resources(&mut resources, &mut rng);

            assert!((0.0..=100.0).contains(&resources.cpu));
            assert!((0.0..=100.0).contains(&resources.memory));
            assert!((resources.cpu - before.cpu).abs() <= CPU_JITTER);
            assert!((resources.memory - before.memory).abs() <= MEMORY_JITTER);
            for volume in &resources.volumes {
                assert!(volume.used >= 0.0 && volume.used <= volume.total);
            }
        }
    }

    #[test]
    fn offline_server_resources_still_drift() {
        let mut rng = rng();
        let mut server = Server::new("web");
        server.resources = ResourceMetrics::new(50.0, 50.0, vec![]);
        server.take_offline();

        let mut changed = false;
        for _ in 0..10 {
            let before = server.resources.cpu;
            tick_entity(&mut server, &mut rng);
            changed |= server.resources.cpu != before;
        }

        assert!(changed);
        assert!(server.history.is_empty());
    }
}
