//! The Nova metric catalog.

use nova_core::ApiVersion;

use crate::metric::MetricSpec;
use crate::producers::{
    AgentState, AvailabilityZones, ComputeLimits, Flavors, Hypervisors, SecurityGroups,
    ServerUsage, Servers,
};

const HYPERVISOR_LABELS: &[&str] = &["hostname", "availability_zone", "aggregates"];
const TENANT_LABELS: &[&str] = &["tenant", "tenant_id"];

/// Nova stopped reporting hypervisor resource fields at this microversion.
const HYPERVISOR_STATS_REMOVED: ApiVersion = ApiVersion::new(2, 88);

/// Every metric the exporter knows, in exposition order.
pub fn nova_catalog() -> Vec<MetricSpec> {
    vec![
        MetricSpec::new("flavors")
            .help("Number of flavors.")
            .produced_by(Flavors),
        MetricSpec::new("flavor")
            .help("Flavor details, value is always 1.")
            .labels(&["id", "name", "vcpus", "ram", "disk", "is_public"]),
        MetricSpec::new("availability_zones")
            .help("Number of availability zones.")
            .produced_by(AvailabilityZones),
        MetricSpec::new("security_groups")
            .help("Number of security groups.")
            .produced_by(SecurityGroups)
            .deprecated_since(ApiVersion::new(2, 36)),
        MetricSpec::new("total_vms")
            .help("Number of servers across all tenants.")
            .produced_by(Servers),
        MetricSpec::new("agent_state")
            .help("Compute service liveness, 1 when up.")
            .labels(&["id", "hostname", "service", "adminState", "zone", "disabledReason"])
            .produced_by(AgentState),
        MetricSpec::new("running_vms")
            .help("Servers running on the hypervisor.")
            .labels(HYPERVISOR_LABELS)
            .deprecated_since(HYPERVISOR_STATS_REMOVED)
            .produced_by(Hypervisors),
        MetricSpec::new("current_workload")
            .help("Tasks in progress on the hypervisor.")
            .labels(HYPERVISOR_LABELS)
            .deprecated_since(HYPERVISOR_STATS_REMOVED),
        MetricSpec::new("vcpus_available")
            .help("Total vCPUs on the hypervisor.")
            .labels(HYPERVISOR_LABELS)
            .deprecated_since(HYPERVISOR_STATS_REMOVED),
        MetricSpec::new("vcpus_used")
            .help("vCPUs allocated on the hypervisor.")
            .labels(HYPERVISOR_LABELS)
            .deprecated_since(HYPERVISOR_STATS_REMOVED),
        MetricSpec::new("memory_available_bytes")
            .help("Total memory on the hypervisor.")
            .labels(HYPERVISOR_LABELS)
            .deprecated_since(HYPERVISOR_STATS_REMOVED),
        MetricSpec::new("memory_used_bytes")
            .help("Memory allocated on the hypervisor.")
            .labels(HYPERVISOR_LABELS)
            .deprecated_since(HYPERVISOR_STATS_REMOVED),
        MetricSpec::new("local_storage_available_bytes")
            .help("Total local disk on the hypervisor.")
            .labels(HYPERVISOR_LABELS)
            .deprecated_since(HYPERVISOR_STATS_REMOVED),
        MetricSpec::new("local_storage_used_bytes")
            .help("Local disk allocated on the hypervisor.")
            .labels(HYPERVISOR_LABELS)
            .deprecated_since(HYPERVISOR_STATS_REMOVED),
        MetricSpec::new("free_disk_bytes")
            .help("Free local disk on the hypervisor.")
            .labels(HYPERVISOR_LABELS)
            .deprecated_since(HYPERVISOR_STATS_REMOVED),
        MetricSpec::new("server_status")
            .help("Server status as an ordinal, -1 when unrecognised.")
            .labels(&[
                "id",
                "status",
                "name",
                "tenant_id",
                "user_id",
                "address_ipv4",
                "address_ipv6",
                "host_id",
                "hypervisor_hostname",
                "uuid",
                "availability_zone",
                "flavor_id",
                "team",
            ]),
        MetricSpec::new("limits_vcpus_max")
            .help("vCPU quota of the tenant.")
            .labels(TENANT_LABELS)
            .produced_by(ComputeLimits)
            .expensive(),
        MetricSpec::new("limits_vcpus_used")
            .help("vCPUs used by the tenant.")
            .labels(TENANT_LABELS)
            .expensive(),
        MetricSpec::new("limits_memory_max")
            .help("Memory quota of the tenant in MiB.")
            .labels(TENANT_LABELS)
            .expensive(),
        MetricSpec::new("limits_memory_used")
            .help("Memory used by the tenant in MiB.")
            .labels(TENANT_LABELS)
            .expensive(),
        MetricSpec::new("limits_instances_used")
            .help("Servers owned by the tenant.")
            .labels(TENANT_LABELS)
            .expensive(),
        MetricSpec::new("limits_instances_max")
            .help("Server quota of the tenant.")
            .labels(TENANT_LABELS)
            .expensive(),
        MetricSpec::new("server_local_gb")
            .help("Local disk of the server in GiB.")
            .labels(&["name", "id", "tenant_id"])
            .produced_by(ServerUsage)
            .expensive(),
    ]
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use nova_client::{CloudSnapshot, Operation, StaticCloudClient};
    use nova_core::{ComputeService, Hypervisor, Server};

    use super::*;
    use crate::Policy;
    use crate::producers::testing::{collect, exporter, of};

    fn active(version: ApiVersion, include_expensive: bool) -> Vec<&'static str> {
        let catalog = nova_catalog();
        Policy {
            api_version: version,
            include_expensive,
        }
        .filter(&catalog)
        .iter()
        .map(|s| s.name)
        .collect()
    }

    #[test]
    fn names_are_unique() {
        let catalog = nova_catalog();
        let names: HashSet<_> = catalog.iter().map(|s| s.name).collect();
        assert_eq!(names.len(), catalog.len());
    }

    #[test]
    fn every_shared_metric_has_a_producer() {
        let catalog = nova_catalog();
        let emitted: HashSet<&str> = catalog
            .iter()
            .filter_map(|s| s.producer())
            .flat_map(|p| p.emits().iter().copied())
            .collect();
        for spec in &catalog {
            assert!(emitted.contains(spec.name), "{} is never emitted", spec.name);
        }
    }

    #[test]
    fn default_policy_excludes_expensive() {
        let names = active(ApiVersion::BASE, false);
        assert!(names.contains(&"security_groups"));
        assert!(names.contains(&"server_status"));
        assert!(!names.iter().any(|n| n.starts_with("limits_")));
        assert!(!names.contains(&"server_local_gb"));
        assert_eq!(names.len(), 16);
    }

    #[test]
    fn expensive_opt_in_adds_limits_and_usage() {
        let names = active(ApiVersion::BASE, true);
        assert_eq!(names.len(), nova_catalog().len());
        assert_eq!(names.last(), Some(&"server_local_gb"));
    }

    #[test]
    fn security_groups_dropped_at_2_36() {
        assert!(active(ApiVersion::new(2, 35), false).contains(&"security_groups"));
        assert!(!active(ApiVersion::new(2, 36), false).contains(&"security_groups"));
        assert!(!active(ApiVersion::LATEST, true).contains(&"security_groups"));
    }

    #[test]
    fn hypervisor_family_dropped_at_2_88() {
        const FAMILY: &[&str] = &[
            "running_vms",
            "current_workload",
            "vcpus_available",
            "vcpus_used",
            "memory_available_bytes",
            "memory_used_bytes",
            "local_storage_available_bytes",
            "local_storage_used_bytes",
            "free_disk_bytes",
        ];
        let before = active(ApiVersion::new(2, 87), false);
        let after = active(ApiVersion::new(2, 88), true);
        for name in FAMILY {
            assert!(before.contains(name), "{name} missing at 2.87");
            assert!(!after.contains(name), "{name} still active at 2.88");
        }
        assert!(!active(ApiVersion::new(2, 90), false).contains(&"vcpus_available"));
        assert!(after.contains(&"total_vms"));
    }

    #[tokio::test]
    async fn hypervisors_not_queried_from_2_88() {
        use nova_teams::TeamCache;

        use crate::{Exporter, ExporterOptions};

        let client = Arc::new(StaticCloudClient::new(CloudSnapshot {
            hypervisors: vec![Hypervisor {
                hostname: "cmp-1".into(),
                ..Hypervisor::default()
            }],
            ..CloudSnapshot::default()
        }));
        let options = ExporterOptions {
            api_version: ApiVersion::new(2, 90),
            ..ExporterOptions::default()
        };
        let exporter =
            Exporter::new(nova_catalog(), options, client.clone(), TeamCache::new("-team")).unwrap();
        assert!(!exporter.is_active("running_vms"));
        assert!(!exporter.is_active("memory_used_bytes"));

        let (report, samples) = collect(&exporter).await;
        assert!(report.is_success());
        assert!(of(&samples, "running_vms").is_empty());
        assert_eq!(client.calls(Operation::ListHypervisors), 0);
    }

    #[test]
    fn filtering_preserves_catalog_order() {
        let all: Vec<_> = nova_catalog().iter().map(|s| s.name).collect();
        let filtered = active(ApiVersion::new(2, 60), true);
        let mut last = 0;
        for name in filtered {
            let pos = all.iter().position(|n| *n == name).unwrap();
            assert!(pos >= last);
            last = pos;
        }
    }

    #[tokio::test]
    async fn agent_state_failure_leaves_total_vms() {
        let client = Arc::new(StaticCloudClient::new(CloudSnapshot {
            servers: vec![
                Server {
                    id: "s1".into(),
                    status: "ACTIVE".into(),
                    ..Server::default()
                },
                Server {
                    id: "s2".into(),
                    status: "ERROR".into(),
                    ..Server::default()
                },
            ],
            services: vec![ComputeService {
                state: "up".into(),
                ..ComputeService::default()
            }],
            hypervisors: vec![Hypervisor {
                hostname: "cmp-1".into(),
                running_vms: 2,
                ..Hypervisor::default()
            }],
            ..CloudSnapshot::default()
        }));
        client.fail(Operation::ListComputeServices);

        let (report, samples) = collect(&exporter(client, false)).await;
        assert_eq!(report.failed, vec!["agent_state"]);
        assert!(of(&samples, "agent_state").is_empty());
        assert_eq!(of(&samples, "total_vms")[0].value, 2.0);
        assert_eq!(of(&samples, "server_status").len(), 2);
        // Producers after the failing one still ran.
        assert_eq!(of(&samples, "running_vms")[0].value, 2.0);
        assert_eq!(report.producers, 6);
        assert_eq!(of(&samples, "up")[0].value, 0.0);
    }
}
