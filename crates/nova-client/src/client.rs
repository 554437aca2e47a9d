//! The `CloudClient` capability.

use std::fmt;

use async_trait::async_trait;

use nova_core::*;

use crate::error::ClientResult;

/// Read-only access to the identity and compute services.
///
/// All calls are remote, fallible, and possibly slow. Implementations
/// must bound each call with their own timeout; callers never add one.
#[async_trait]
pub trait CloudClient: Send + Sync {
    /// Highest compute microversion the endpoint supports.
    async fn api_version(&self) -> ClientResult<ApiVersion>;

    /// Pin the microversion sent with every subsequent compute call.
    fn use_microversion(&self, _version: ApiVersion) {}

    async fn list_tenants(&self) -> ClientResult<Vec<Tenant>>;

    async fn list_servers(&self, all_tenants: bool) -> ClientResult<Vec<Server>>;

    async fn list_flavors(&self) -> ClientResult<Vec<Flavor>>;

    async fn list_availability_zones(&self) -> ClientResult<Vec<AvailabilityZone>>;

    async fn list_security_groups(&self) -> ClientResult<Vec<SecurityGroup>>;

    async fn list_compute_services(&self) -> ClientResult<Vec<ComputeService>>;

    async fn list_hypervisors(&self) -> ClientResult<Vec<Hypervisor>>;

    async fn list_aggregates(&self) -> ClientResult<Vec<Aggregate>>;

    async fn compute_limits(&self, tenant_id: &str) -> ClientResult<ComputeLimits>;

    async fn list_server_usage(&self) -> ClientResult<Vec<ServerUsage>>;
}

/// Names each client call, for logging and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ApiVersion,
    ListTenants,
    ListServers,
    ListFlavors,
    ListAvailabilityZones,
    ListSecurityGroups,
    ListComputeServices,
    ListHypervisors,
    ListAggregates,
    ComputeLimits,
    ListServerUsage,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::ApiVersion => "api_version",
            Operation::ListTenants => "list_tenants",
            Operation::ListServers => "list_servers",
            Operation::ListFlavors => "list_flavors",
            Operation::ListAvailabilityZones => "list_availability_zones",
            Operation::ListSecurityGroups => "list_security_groups",
            Operation::ListComputeServices => "list_compute_services",
            Operation::ListHypervisors => "list_hypervisors",
            Operation::ListAggregates => "list_aggregates",
            Operation::ComputeLimits => "compute_limits",
            Operation::ListServerUsage => "list_server_usage",
        };
        f.write_str(name)
    }
}
