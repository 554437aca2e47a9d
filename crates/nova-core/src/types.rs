//! Records read from the identity and compute APIs.
//!
//! These are the already-extracted shapes the exporter works with, not
//! the raw API payloads. Every type is serializable so a whole cloud can
//! be captured as a JSON fixture.

use serde::{Deserialize, Serialize};

/// Opaque tenant (project) identifier.
pub type TenantId = String;

// ── Identity ───────────────────────────────────────────────────────

/// An identity-service project.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tenant {
    pub id: TenantId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Tenant {
    pub fn new(id: impl Into<String>, name: impl Into<String>, tags: &[&str]) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }
}

// ── Compute ────────────────────────────────────────────────────────

/// A server as listed with `all_tenants=true`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Server {
    pub id: String,
    pub name: String,
    pub status: String,
    pub tenant_id: TenantId,
    pub user_id: String,
    pub access_ipv4: String,
    pub access_ipv6: String,
    pub host_id: String,
    pub hypervisor_hostname: String,
    pub availability_zone: String,
    pub flavor_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Flavor {
    pub id: String,
    pub name: String,
    pub vcpus: u32,
    /// Memory in MiB.
    pub ram: u64,
    /// Root disk in GiB.
    pub disk: u64,
    pub is_public: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AvailabilityZone {
    pub name: String,
    pub available: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
    pub tenant_id: TenantId,
}

/// A nova-compute / nova-conductor / ... service record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ComputeService {
    pub id: String,
    pub binary: String,
    pub host: String,
    pub zone: String,
    /// Administrative status: `enabled` or `disabled`.
    pub status: String,
    /// Liveness as seen by the scheduler: `up` or `down`.
    pub state: String,
    pub disabled_reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Hypervisor {
    pub hostname: String,
    pub running_vms: u64,
    pub current_workload: u64,
    pub vcpus: u64,
    pub vcpus_used: u64,
    pub memory_mb: u64,
    pub memory_mb_used: u64,
    pub local_gb: u64,
    pub local_gb_used: u64,
    pub free_disk_gb: i64,
}

/// A host aggregate. Aggregates are how hosts map to availability zones.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Aggregate {
    pub name: String,
    pub availability_zone: Option<String>,
    pub hosts: Vec<String>,
}

/// Absolute compute limits for one tenant. Memory values are MiB.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ComputeLimits {
    pub max_total_cores: i64,
    pub total_cores_used: i64,
    pub max_total_ram_size: i64,
    pub total_ram_used: i64,
    pub max_total_instances: i64,
    pub total_instances_used: i64,
}

/// One server's entry in the simple tenant usage report.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerUsage {
    pub name: String,
    pub instance_id: String,
    pub tenant_id: TenantId,
    pub local_gb: u64,
}
