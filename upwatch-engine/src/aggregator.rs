//! Status aggregation.
//!
//! Rolls per-entity statuses and latency samples up into one system-wide
//! health tier. Offline anywhere dominates; Warning anywhere, or a weighted
//! latency above [`LATENCY_WARNING_MS`], escalates to Warning.

use upwatch_types::{FleetSnapshot, Status};

/// Weighted latency above which the overall status escalates to Warning.
pub const LATENCY_WARNING_MS: f64 = 100.0;

/// Weight of a latency sample by bracket.
///
/// Slow samples count for more, so a few bad readings pull the average up
/// faster than many good ones pull it down.
pub fn latency_weight(sample: f64) -> f64 {
    if sample <= 50.0 {
        1.0
    } else if sample <= 100.0 {
        1.5
    } else if sample <= 150.0 {
        2.0
    } else if sample <= 200.0 {
        3.0
    } else {
        4.0
    }
}

/// Bracket-weighted average of `samples`, or 0 when there are none.
pub fn weighted_latency(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    let (weighted_sum, total_weight) = sorted.iter().fold((0.0, 0.0), |(sum, weights), &s| {
        let w = latency_weight(s);
        (sum + s * w, weights + w)
    });

    if total_weight > 0.0 {
        weighted_sum / total_weight
    } else {
        0.0
    }
}

/// Inputs to the overall status derivation.
#[derive(Debug, Clone, Copy)]
pub struct AggregateInput<'a> {
    pub statuses: &'a [Status],
    pub samples: &'a [f64],
    /// Simulated monitoring is on.
    pub monitoring_enabled: bool,
    /// The local device probe is running.
    pub device_active: bool,
}

/// Result of one aggregation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregate {
    pub status: Status,
    pub weighted_latency: f64,
}

/// Derive the overall status, in priority order:
///
/// 1. any Offline entity → Offline
/// 2. any Warning entity, or weighted latency above 100ms → Warning
/// 3. monitoring disabled with no device probe → Offline (no data)
/// 4. otherwise Online
pub fn aggregate(input: AggregateInput<'_>) -> Aggregate {
    let weighted = weighted_latency(input.samples);

    let status = if input.statuses.contains(&Status::Offline) {
        Status::Offline
    } else if input.statuses.contains(&Status::Warning) || weighted > LATENCY_WARNING_MS {
        Status::Warning
    } else if !input.monitoring_enabled && !input.device_active {
        Status::Offline
    } else {
        Status::Online
    };

    Aggregate {
        status,
        weighted_latency: weighted,
    }
}

/// Aggregate a published snapshot.
pub fn aggregate_snapshot(snapshot: &FleetSnapshot) -> Aggregate {
    let statuses: Vec<Status> = snapshot.statuses().collect();
    let samples: Vec<f64> = snapshot
        .servers
        .iter()
        .map(|s| s.latest_sample)
        .chain(snapshot.services.iter().map(|s| s.latest_sample))
        .chain(snapshot.virtual_machines.iter().map(|v| v.latest_sample))
        .chain(snapshot.device.iter().map(|d| d.latest_sample))
        .collect();

    aggregate(AggregateInput {
        statuses: &statuses,
        samples: &samples,
        monitoring_enabled: snapshot.simulation_enabled,
        device_active: snapshot.device.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use upwatch_types::{LocalDevice, Monitored, Server};

    fn input<'a>(statuses: &'a [Status], samples: &'a [f64]) -> AggregateInput<'a> {
        AggregateInput {
            statuses,
            samples,
            monitoring_enabled: true,
            device_active: false,
        }
    }

    #[test]
    fn weights_by_bracket() {
        assert_eq!(latency_weight(0.0), 1.0);
        assert_eq!(latency_weight(50.0), 1.0);
        assert_eq!(latency_weight(50.1), 1.5);
        assert_eq!(latency_weight(100.0), 1.5);
        assert_eq!(latency_weight(150.0), 2.0);
        assert_eq!(latency_weight(200.0), 3.0);
        assert_eq!(latency_weight(200.5), 4.0);
    }

    #[test]
    fn weighted_average_matches_hand_computation() {
        let avg = weighted_latency(&[220.0, 40.0, 120.0]);
        let expected = (40.0 * 1.0 + 120.0 * 2.0 + 220.0 * 4.0) / 7.0;
        assert!((avg - expected).abs() < 1e-9);
        assert!((avg - 165.714).abs() < 0.01);
    }

    #[test]
    fn weighted_average_of_nothing_is_zero() {
        assert_eq!(weighted_latency(&[]), 0.0);
    }

    #[test]
    fn offline_dominates_warning() {
        let result = aggregate(input(&[Status::Warning, Status::Offline], &[150.0, 0.0]));
        assert_eq!(result.status, Status::Offline);
    }

    #[test]
    fn any_warning_escalates() {
        let result = aggregate(input(&[Status::Online, Status::Warning], &[10.0, 10.0]));
        assert_eq!(result.status, Status::Warning);
    }

    #[test]
    fn high_weighted_latency_escalates_online_fleet() {
        let result = aggregate(input(&[Status::Online, Status::Online], &[180.0, 190.0]));
        assert_eq!(result.status, Status::Warning);
        assert!(result.weighted_latency > LATENCY_WARNING_MS);
    }

    #[test]
    fn healthy_fleet_is_online() {
        let result = aggregate(input(&[Status::Online; 3], &[10.0, 20.0, 30.0]));
        assert_eq!(result.status, Status::Online);
    }

    #[test]
    fn no_monitoring_and_no_device_is_offline() {
        let result = aggregate(AggregateInput {
            statuses: &[],
            samples: &[],
            monitoring_enabled: false,
            device_active: false,
        });
        assert_eq!(result.status, Status::Offline);
        assert_eq!(result.weighted_latency, 0.0);
    }

    #[test]
    fn device_alone_keeps_fleet_online() {
        let result = aggregate(AggregateInput {
            statuses: &[Status::Online],
            samples: &[18.0],
            monitoring_enabled: false,
            device_active: true,
        });
        assert_eq!(result.status, Status::Online);
    }

    #[test]
    fn aggregates_published_snapshot() {
        let mut server = Server::new("web");
        server.latest_sample = 20.0;
        let mut device = LocalDevice::new("This Device", "https://1.1.1.1");
        device.take_offline();

        let snapshot = FleetSnapshot {
            simulation_enabled: true,
            servers: vec![server],
            device: Some(device),
            ..Default::default()
        };

        let result = aggregate_snapshot(&snapshot);
        assert_eq!(result.status, Status::Offline);
        assert!((result.weighted_latency - 10.0).abs() < 1e-9);
    }
}
