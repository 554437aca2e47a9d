//! In-memory [`CloudClient`] backed by a snapshot of a cloud.
//!
//! Used by tests across the workspace and by the daemon's `--fixture`
//! mode. Individual operations can be made to fail, and tenant listing
//! can be slowed down to exercise overlapping refreshes.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use nova_core::*;

use crate::client::{CloudClient, Operation};
use crate::error::{ClientError, ClientResult};

/// Everything a [`StaticCloudClient`] can answer with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudSnapshot {
    pub api_version: Option<ApiVersion>,
    pub tenants: Vec<Tenant>,
    pub servers: Vec<Server>,
    pub flavors: Vec<Flavor>,
    pub availability_zones: Vec<AvailabilityZone>,
    pub security_groups: Vec<SecurityGroup>,
    pub services: Vec<ComputeService>,
    pub hypervisors: Vec<Hypervisor>,
    pub aggregates: Vec<Aggregate>,
    /// Tenant id → limits. Tenants without an entry report zeroes.
    pub limits: HashMap<TenantId, ComputeLimits>,
    pub usage: Vec<ServerUsage>,
}

impl CloudSnapshot {
    /// Load a snapshot from a JSON file.
    pub fn from_file(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Fixture(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| ClientError::Fixture(format!("{}: {e}", path.display())))
    }
}

#[derive(Default)]
pub struct StaticCloudClient {
    snapshot: RwLock<CloudSnapshot>,
    failing: RwLock<HashSet<Operation>>,
    calls: Mutex<HashMap<Operation, usize>>,
    tenant_delay: RwLock<Option<Duration>>,
    microversion: RwLock<Option<ApiVersion>>,
    running_tenant_calls: AtomicUsize,
    max_tenant_calls: AtomicUsize,
}

impl StaticCloudClient {
    pub fn new(snapshot: CloudSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
            ..Self::default()
        }
    }

    /// Modify the snapshot in place.
    pub fn update<F: FnOnce(&mut CloudSnapshot)>(&self, f: F) {
        f(&mut write(&self.snapshot));
    }

    pub fn set_tenants(&self, tenants: Vec<Tenant>) {
        self.update(|s| s.tenants = tenants);
    }

    /// Make `op` fail until [`StaticCloudClient::recover`] is called.
    pub fn fail(&self, op: Operation) {
        write(&self.failing).insert(op);
    }

    pub fn recover(&self, op: Operation) {
        write(&self.failing).remove(&op);
    }

    /// Delay every `list_tenants` call by `delay`.
    pub fn delay_tenants(&self, delay: Duration) {
        *write(&self.tenant_delay) = Some(delay);
    }

    /// How many times `op` has been called.
    pub fn calls(&self, op: Operation) -> usize {
        let calls = match self.calls.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        calls.get(&op).copied().unwrap_or(0)
    }

    /// Highest number of `list_tenants` calls seen running at once.
    pub fn max_concurrent_tenant_calls(&self) -> usize {
        self.max_tenant_calls.load(Ordering::SeqCst)
    }

    /// Microversion pinned through [`CloudClient::use_microversion`].
    pub fn microversion(&self) -> Option<ApiVersion> {
        *read(&self.microversion)
    }

    fn enter(&self, op: Operation) -> ClientResult<()> {
        {
            let mut calls = match self.calls.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *calls.entry(op).or_insert(0) += 1;
        }
        if read(&self.failing).contains(&op) {
            return Err(ClientError::Injected(op));
        }
        Ok(())
    }

    fn with<T, F: FnOnce(&CloudSnapshot) -> T>(&self, op: Operation, f: F) -> ClientResult<T> {
        self.enter(op)?;
        Ok(f(&read(&self.snapshot)))
    }
}

#[async_trait]
impl CloudClient for StaticCloudClient {
    async fn api_version(&self) -> ClientResult<ApiVersion> {
        self.with(Operation::ApiVersion, |s| s.api_version.unwrap_or(ApiVersion::BASE))
    }

    fn use_microversion(&self, version: ApiVersion) {
        *write(&self.microversion) = Some(version);
    }

    async fn list_tenants(&self) -> ClientResult<Vec<Tenant>> {
        let delay = *read(&self.tenant_delay);
        if let Some(delay) = delay {
            let _running = TenantCallGuard::enter(&self.running_tenant_calls, &self.max_tenant_calls);
            tokio::time::sleep(delay).await;
        }
        self.with(Operation::ListTenants, |s| s.tenants.clone())
    }

    async fn list_servers(&self, all_tenants: bool) -> ClientResult<Vec<Server>> {
        // The snapshot has no notion of a current tenant, so both modes
        // see every server.
        let _ = all_tenants;
        self.with(Operation::ListServers, |s| s.servers.clone())
    }

    async fn list_flavors(&self) -> ClientResult<Vec<Flavor>> {
        self.with(Operation::ListFlavors, |s| s.flavors.clone())
    }

    async fn list_availability_zones(&self) -> ClientResult<Vec<AvailabilityZone>> {
        self.with(Operation::ListAvailabilityZones, |s| s.availability_zones.clone())
    }

    async fn list_security_groups(&self) -> ClientResult<Vec<SecurityGroup>> {
        self.with(Operation::ListSecurityGroups, |s| s.security_groups.clone())
    }

    async fn list_compute_services(&self) -> ClientResult<Vec<ComputeService>> {
        self.with(Operation::ListComputeServices, |s| s.services.clone())
    }

    async fn list_hypervisors(&self) -> ClientResult<Vec<Hypervisor>> {
        self.with(Operation::ListHypervisors, |s| s.hypervisors.clone())
    }

    async fn list_aggregates(&self) -> ClientResult<Vec<Aggregate>> {
        self.with(Operation::ListAggregates, |s| s.aggregates.clone())
    }

    async fn compute_limits(&self, tenant_id: &str) -> ClientResult<ComputeLimits> {
        self.with(Operation::ComputeLimits, |s| {
            s.limits.get(tenant_id).cloned().unwrap_or_default()
        })
    }

    async fn list_server_usage(&self) -> ClientResult<Vec<ServerUsage>> {
        self.with(Operation::ListServerUsage, |s| s.usage.clone())
    }
}

/// Counts a running `list_tenants` call and records the high water mark.
struct TenantCallGuard<'a> {
    running: &'a AtomicUsize,
}

impl<'a> TenantCallGuard<'a> {
    fn enter(running: &'a AtomicUsize, max: &AtomicUsize) -> Self {
        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        Self { running }
    }
}

impl Drop for TenantCallGuard<'_> {
    fn drop(&mut self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn answers_from_snapshot() {
        let client = StaticCloudClient::new(CloudSnapshot {
            api_version: Some(ApiVersion::new(2, 79)),
            tenants: vec![Tenant::new("t1", "alpha", &["infra-team"])],
            ..CloudSnapshot::default()
        });
        assert_eq!(client.api_version().await.unwrap(), ApiVersion::new(2, 79));
        assert_eq!(client.list_tenants().await.unwrap().len(), 1);
        assert!(client.list_servers(true).await.unwrap().is_empty());
        assert_eq!(client.calls(Operation::ListTenants), 1);
    }

    #[tokio::test]
    async fn injected_failures_until_recovered() {
        let client = StaticCloudClient::new(CloudSnapshot::default());
        client.fail(Operation::ListFlavors);
        assert!(matches!(
            client.list_flavors().await,
            Err(ClientError::Injected(Operation::ListFlavors))
        ));
        client.recover(Operation::ListFlavors);
        assert!(client.list_flavors().await.is_ok());
        assert_eq!(client.calls(Operation::ListFlavors), 2);
    }

    #[tokio::test]
    async fn missing_limits_default_to_zero() {
        let client = StaticCloudClient::new(CloudSnapshot::default());
        let limits = client.compute_limits("nobody").await.unwrap();
        assert_eq!(limits, ComputeLimits::default());
    }

    #[test]
    fn snapshot_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"api_version":"2.60","tenants":[{{"id":"t1","tags":["db-team"]}}],
                "servers":[{{"id":"s1","status":"ACTIVE","tenant_id":"t1"}}]}}"#
        )
        .unwrap();
        let snapshot = CloudSnapshot::from_file(file.path()).unwrap();
        assert_eq!(snapshot.api_version, Some(ApiVersion::new(2, 60)));
        assert_eq!(snapshot.tenants[0].tags, vec!["db-team".to_string()]);
        assert_eq!(snapshot.servers[0].status, "ACTIVE");
        assert!(snapshot.flavors.is_empty());
    }

    #[test]
    fn pinned_microversion_is_recorded() {
        let client = StaticCloudClient::default();
        assert_eq!(client.microversion(), None);
        client.use_microversion(ApiVersion::new(2, 53));
        assert_eq!(client.microversion(), Some(ApiVersion::new(2, 53)));
    }
}
