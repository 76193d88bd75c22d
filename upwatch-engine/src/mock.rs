//! Mock fleet generation.

use rand::Rng;
use upwatch_types::{ResourceMetrics, Server, Service, StorageVolume, VirtualMachine};

use crate::state::Fleet;
use crate::telemetry::RESET_RANGE;
use crate::SimulationCounts;

pub const SERVER_NAMES: [&str; 8] = [
    "Web Server",
    "Database Server",
    "API Server",
    "Cache Server",
    "Auth Server",
    "Storage Server",
    "Backup Server",
    "Load Balancer",
];

pub const SERVICE_NAMES: [&str; 12] = [
    "Web Frontend",
    "Database",
    "API Gateway",
    "Cache Service",
    "Authentication",
    "Storage Service",
    "Backup Service",
    "Load Balancer",
    "Search Service",
    "Message Queue",
    "Email Service",
    "Monitoring Service",
];

const LOCATIONS: [&str; 3] = ["Data Center 1", "Data Center 2", "Edge Site"];

/// Name for the `index`th entity, suffixing a number once the catalogue wraps.
fn catalogue_name(catalogue: &[&str], index: usize) -> String {
    let base = catalogue[index % catalogue.len()];
    match index / catalogue.len() {
        0 => base.to_string(),
        round => format!("{base} {}", round + 1),
    }
}

fn server_resources<R: Rng + ?Sized>(rng: &mut R) -> ResourceMetrics {
    ResourceMetrics::new(
        rng.gen_range(20.0..=80.0),
        rng.gen_range(30.0..=90.0),
        vec![
            StorageVolume::new("System", 512.0, 384.0),
            StorageVolume::new("Data", 1024.0, 768.0),
            StorageVolume::new("Backup", 2048.0, 1024.0),
        ],
    )
}

fn vm_resources<R: Rng + ?Sized>(rng: &mut R) -> ResourceMetrics {
    ResourceMetrics::new(
        rng.gen_range(20.0..=80.0),
        rng.gen_range(30.0..=90.0),
        vec![
            StorageVolume::new("System", 512.0, 384.0),
            StorageVolume::new("Data", 1024.0, 768.0),
        ],
    )
}

/// Build a fresh fleet with new ids.
///
/// Services and VMs are spread over servers round-robin. With no servers
/// there is nothing to host them on, so none are created. Every entity
/// starts Online with a sample from the reset range and an empty history.
pub fn generate_fleet<R: Rng + ?Sized>(counts: SimulationCounts, rng: &mut R) -> Fleet {
    let servers: Vec<Server> = (0..counts.servers)
        .map(|i| {
            let mut server = Server::new(catalogue_name(&SERVER_NAMES, i));
            server.latest_sample = rng.gen_range(RESET_RANGE);
            server.resources = server_resources(rng);
            server.ip_address = format!("192.168.0.{}", 10 + i);
            server.location = LOCATIONS[i % LOCATIONS.len()].to_string();
            server
        })
        .collect();

    if servers.is_empty() {
        return Fleet {
            servers,
            ..Fleet::default()
        };
    }

    let services = (0..counts.services)
        .map(|i| {
            let host = &servers[i % servers.len()];
            let mut service = Service::new(catalogue_name(&SERVICE_NAMES, i), host.id);
            service.latest_sample = rng.gen_range(RESET_RANGE);
            service
        })
        .collect();

    let virtual_machines = (0..counts.virtual_machines)
        .map(|i| {
            let host = &servers[i % servers.len()];
            let mut vm = VirtualMachine::new(format!("VM-{}", i + 1), host.id);
            vm.latest_sample = rng.gen_range(RESET_RANGE);
            vm.resources = vm_resources(rng);
            vm.ip_address = format!("192.168.1.{}", 100 + i);
            vm
        })
        .collect();

    Fleet {
        servers,
        services,
        virtual_machines,
        device: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use upwatch_types::Status;

    #[test]
    fn generates_requested_counts() {
        let mut rng = StdRng::seed_from_u64(1);
        let fleet = generate_fleet(SimulationCounts::new(3, 5, 2), &mut rng);

        assert_eq!(fleet.servers.len(), 3);
        assert_eq!(fleet.services.len(), 5);
        assert_eq!(fleet.virtual_machines.len(), 2);
        assert!(fleet.device.is_none());
    }

    #[test]
    fn services_assigned_round_robin() {
        let mut rng = StdRng::seed_from_u64(2);
        let fleet = generate_fleet(SimulationCounts::new(2, 5, 3), &mut rng);

        let first = fleet.servers[0].id;
        let second = fleet.servers[1].id;
        let owners: Vec<_> = fleet.services.iter().map(|s| s.server_id).collect();
        assert_eq!(owners, vec![first, second, first, second, first]);

        let parents: Vec<_> = fleet.virtual_machines.iter().map(|v| v.parent_server_id).collect();
        assert_eq!(parents, vec![first, second, first]);
    }

    #[test]
    fn no_servers_means_no_dependents() {
        let mut rng = StdRng::seed_from_u64(3);
        let fleet = generate_fleet(SimulationCounts::new(0, 4, 4), &mut rng);
        assert!(fleet.servers.is_empty());
        assert!(fleet.services.is_empty());
        assert!(fleet.virtual_machines.is_empty());
    }

    #[test]
    fn entities_start_online_with_reset_samples() {
        let mut rng = StdRng::seed_from_u64(4);
        let fleet = generate_fleet(SimulationCounts::new(8, 12, 6), &mut rng);

        for entity in fleet.simulated() {
            assert_eq!(entity.status(), Status::Online);
            assert!(RESET_RANGE.contains(&entity.latest_sample()));
            assert!(entity.history().is_empty());
        }
    }

    #[test]
    fn catalogue_names_wrap_with_suffix() {
        assert_eq!(catalogue_name(&SERVER_NAMES, 0), "Web Server");
        assert_eq!(catalogue_name(&SERVER_NAMES, 8), "Web Server 2");
        assert_eq!(catalogue_name(&SERVICE_NAMES, 13), "Database 2");
    }

    #[test]
    fn regenerating_replaces_all_ids() {
        let mut rng = StdRng::seed_from_u64(5);
        let a = generate_fleet(SimulationCounts::default(), &mut rng);
        let b = generate_fleet(SimulationCounts::default(), &mut rng);

        for (old, new) in a.servers.iter().zip(&b.servers) {
            assert_ne!(old.id, new.id);
        }
    }
}
