use std::collections::HashMap;

use async_trait::async_trait;

use nova_core::Aggregate;

use super::{GIB, MIB};
use crate::error::ProducerResult;
use crate::metric::Producer;
use crate::registry::Exporter;
use crate::sample::SampleSink;

/// The whole hypervisor family from one hypervisor listing and one
/// aggregate listing.
pub struct Hypervisors;

#[derive(Debug, Default, PartialEq)]
struct Placement {
    zone: String,
    aggregates: Vec<String>,
}

/// Host → availability zone and aggregate names. Hosts are keyed by
/// their short name so FQDN hypervisor hostnames still match.
fn placements(aggregates: &[Aggregate]) -> HashMap<String, Placement> {
    let mut out: HashMap<String, Placement> = HashMap::new();
    for agg in aggregates {
        for host in &agg.hosts {
            let entry = out.entry(short_host(host).to_string()).or_default();
            if let Some(zone) = &agg.availability_zone {
                if entry.zone.is_empty() {
                    entry.zone = zone.clone();
                }
            }
            entry.aggregates.push(agg.name.clone());
        }
    }
    out
}

fn short_host(hostname: &str) -> &str {
    hostname.split('.').next().unwrap_or(hostname)
}

#[async_trait]
impl Producer for Hypervisors {
    fn emits(&self) -> &'static [&'static str] {
        &[
            "running_vms",
            "current_workload",
            "vcpus_available",
            "vcpus_used",
            "memory_available_bytes",
            "memory_used_bytes",
            "local_storage_available_bytes",
            "local_storage_used_bytes",
            "free_disk_bytes",
        ]
    }

    async fn produce(&self, exporter: &Exporter, out: &SampleSink<'_>) -> ProducerResult<()> {
        let client = exporter.client();
        let hypervisors = client.list_hypervisors().await?;
        let aggregates = client.list_aggregates().await?;
        let placements = placements(&aggregates);

        for h in &hypervisors {
            let (zone, aggs) = match placements.get(short_host(&h.hostname)) {
                Some(p) => (p.zone.clone(), p.aggregates.join(",")),
                None => (String::new(), String::new()),
            };
            let labels = [h.hostname.as_str(), zone.as_str(), aggs.as_str()];

            let values = [
                ("running_vms", h.running_vms as f64),
                ("current_workload", h.current_workload as f64),
                ("vcpus_available", h.vcpus as f64),
                ("vcpus_used", h.vcpus_used as f64),
                ("memory_available_bytes", h.memory_mb as f64 * MIB),
                ("memory_used_bytes", h.memory_mb_used as f64 * MIB),
                ("local_storage_available_bytes", h.local_gb as f64 * GIB),
                ("local_storage_used_bytes", h.local_gb_used as f64 * GIB),
                ("free_disk_bytes", h.free_disk_gb as f64 * GIB),
            ];
            for (name, value) in values {
                out.emit(name, &labels, value).await?;
            }
        }
        Ok(())
    }
}
