//! JSON payload shapes of the Keystone v3 and Nova v2.1 APIs.
//!
//! Only the fields the exporter reads are declared. Conversions into
//! the `nova_core` records live here so the HTTP client stays about
//! transport.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use nova_core::*;

/// One page of a paginated listing.
pub(crate) trait Page: DeserializeOwned + Send {
    type Item: Send;

    /// The page's records and the URL of the following page, if any.
    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

// ── Keystone ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct AuthRequest<'a> {
    pub auth: AuthBody<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AuthBody<'a> {
    pub identity: Identity<'a>,
    pub scope: Scope<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Identity<'a> {
    pub methods: [&'static str; 1],
    pub password: PasswordMethod<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PasswordMethod<'a> {
    pub user: UserCredentials<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserCredentials<'a> {
    pub name: &'a str,
    pub domain: DomainRef<'a>,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct DomainRef<'a> {
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct Scope<'a> {
    pub project: ProjectRef<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProjectRef<'a> {
    pub name: &'a str,
    pub domain: DomainRef<'a>,
}

impl<'a> AuthRequest<'a> {
    pub fn password(
        username: &'a str,
        password: &'a str,
        user_domain: &'a str,
        project: &'a str,
        project_domain: &'a str,
    ) -> Self {
        Self {
            auth: AuthBody {
                identity: Identity {
                    methods: ["password"],
                    password: PasswordMethod {
                        user: UserCredentials {
                            name: username,
                            domain: DomainRef { name: user_domain },
                            password,
                        },
                    },
                },
                scope: Scope {
                    project: ProjectRef {
                        name: project,
                        domain: DomainRef {
                            name: project_domain,
                        },
                    },
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub token: TokenBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenBody {
    #[serde(default)]
    pub catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CatalogEntry {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CatalogEndpoint {
    pub interface: String,
    #[serde(default)]
    pub region_id: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    pub url: String,
}

impl TokenBody {
    /// Find the endpoint URL for a service type, interface and optional region.
    pub fn endpoint(&self, service_type: &str, interface: &str, region: Option<&str>) -> Option<String> {
        self.catalog
            .iter()
            .filter(|entry| entry.service_type == service_type)
            .flat_map(|entry| entry.endpoints.iter())
            .find(|ep| {
                ep.interface == interface
                    && region.is_none_or(|r| {
                        ep.region_id.as_deref() == Some(r) || ep.region.as_deref() == Some(r)
                    })
            })
            .map(|ep| ep.url.trim_end_matches('/').to_string())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProjectList {
    pub projects: Vec<ProjectRecord>,
    #[serde(default)]
    pub links: ProjectLinks,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ProjectLinks {
    #[serde(default)]
    pub next: Option<String>,
}

impl Page for ProjectList {
    type Item = ProjectRecord;

    fn into_parts(self) -> (Vec<ProjectRecord>, Option<String>) {
        let next = self.links.next.filter(|href| !href.is_empty());
        (self.projects, next)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProjectRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl From<ProjectRecord> for Tenant {
    fn from(p: ProjectRecord) -> Self {
        Tenant {
            id: p.id,
            name: p.name,
            tags: p.tags,
        }
    }
}

// ── Nova ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct VersionDocument {
    pub version: VersionRecord,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VersionRecord {
    /// Maximum microversion; empty on endpoints without microversions.
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Link {
    #[serde(default)]
    pub rel: String,
    #[serde(default)]
    pub href: String,
}

/// The `href` of the `rel=next` link, if any.
pub(crate) fn next_link(links: &[Link]) -> Option<String> {
    links
        .iter()
        .find(|l| l.rel == "next" && !l.href.is_empty())
        .map(|l| l.href.clone())
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerList {
    pub servers: Vec<ServerRecord>,
    #[serde(default)]
    pub servers_links: Vec<Link>,
}

impl Page for ServerList {
    type Item = ServerRecord;

    fn into_parts(self) -> (Vec<ServerRecord>, Option<String>) {
        let next = next_link(&self.servers_links);
        (self.servers, next)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default, rename = "accessIPv4")]
    pub access_ipv4: String,
    #[serde(default, rename = "accessIPv6")]
    pub access_ipv6: String,
    #[serde(default, rename = "hostId")]
    pub host_id: String,
    #[serde(default, rename = "OS-EXT-SRV-ATTR:hypervisor_hostname")]
    pub hypervisor_hostname: Option<String>,
    #[serde(default, rename = "OS-EXT-AZ:availability_zone")]
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub flavor: Value,
}

impl From<ServerRecord> for Server {
    fn from(s: ServerRecord) -> Self {
        // Before 2.47 the flavor is a reference with an id; from 2.47 on
        // it is embedded and only carries the original name.
        let flavor_id = s
            .flavor
            .get("id")
            .or_else(|| s.flavor.get("original_name"))
            .map(value_to_string)
            .unwrap_or_default();
        Server {
            id: s.id,
            name: s.name,
            status: s.status,
            tenant_id: s.tenant_id,
            user_id: s.user_id,
            access_ipv4: s.access_ipv4,
            access_ipv6: s.access_ipv6,
            host_id: s.host_id,
            hypervisor_hostname: s.hypervisor_hostname.unwrap_or_default(),
            availability_zone: s.availability_zone.unwrap_or_default(),
            flavor_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct FlavorList {
    pub flavors: Vec<FlavorRecord>,
    #[serde(default)]
    pub flavors_links: Vec<Link>,
}

impl Page for FlavorList {
    type Item = FlavorRecord;

    fn into_parts(self) -> (Vec<FlavorRecord>, Option<String>) {
        let next = next_link(&self.flavors_links);
        (self.flavors, next)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct FlavorRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub vcpus: u32,
    #[serde(default)]
    pub ram: u64,
    #[serde(default)]
    pub disk: u64,
    #[serde(default = "default_true", rename = "os-flavor-access:is_public")]
    pub is_public: bool,
}

fn default_true() -> bool {
    true
}

impl From<FlavorRecord> for Flavor {
    fn from(f: FlavorRecord) -> Self {
        Flavor {
            id: f.id,
            name: f.name,
            vcpus: f.vcpus,
            ram: f.ram,
            disk: f.disk,
            is_public: f.is_public,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AvailabilityZoneList {
    #[serde(rename = "availabilityZoneInfo")]
    pub zones: Vec<AvailabilityZoneRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AvailabilityZoneRecord {
    #[serde(rename = "zoneName")]
    pub zone_name: String,
    #[serde(rename = "zoneState", default)]
    pub zone_state: ZoneState,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ZoneState {
    #[serde(default)]
    pub available: bool,
}

impl From<AvailabilityZoneRecord> for AvailabilityZone {
    fn from(z: AvailabilityZoneRecord) -> Self {
        AvailabilityZone {
            name: z.zone_name,
            available: z.zone_state.available,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SecurityGroupList {
    pub security_groups: Vec<SecurityGroupRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SecurityGroupRecord {
    pub id: Value,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tenant_id: String,
}

impl From<SecurityGroupRecord> for SecurityGroup {
    fn from(g: SecurityGroupRecord) -> Self {
        SecurityGroup {
            id: value_to_string(&g.id),
            name: g.name,
            tenant_id: g.tenant_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServiceList {
    pub services: Vec<ServiceRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServiceRecord {
    /// Integer before 2.53, UUID string from 2.53 on.
    pub id: Value,
    #[serde(default)]
    pub binary: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub disabled_reason: Option<String>,
}

impl From<ServiceRecord> for ComputeService {
    fn from(s: ServiceRecord) -> Self {
        ComputeService {
            id: value_to_string(&s.id),
            binary: s.binary,
            host: s.host,
            zone: s.zone,
            status: s.status,
            state: s.state,
            disabled_reason: s.disabled_reason.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct HypervisorList {
    pub hypervisors: Vec<HypervisorRecord>,
    #[serde(default)]
    pub hypervisors_links: Vec<Link>,
}

impl Page for HypervisorList {
    type Item = HypervisorRecord;

    fn into_parts(self) -> (Vec<HypervisorRecord>, Option<String>) {
        let next = next_link(&self.hypervisors_links);
        (self.hypervisors, next)
    }
}

/// Resource fields were dropped from the API at 2.88 and default to zero.
#[derive(Debug, Deserialize)]
pub(crate) struct HypervisorRecord {
    #[serde(default)]
    pub hypervisor_hostname: String,
    #[serde(default)]
    pub running_vms: Option<u64>,
    #[serde(default)]
    pub current_workload: Option<u64>,
    #[serde(default)]
    pub vcpus: Option<u64>,
    #[serde(default)]
    pub vcpus_used: Option<u64>,
    #[serde(default)]
    pub memory_mb: Option<u64>,
    #[serde(default)]
    pub memory_mb_used: Option<u64>,
    #[serde(default)]
    pub local_gb: Option<u64>,
    #[serde(default)]
    pub local_gb_used: Option<u64>,
    #[serde(default)]
    pub free_disk_gb: Option<i64>,
}

impl From<HypervisorRecord> for Hypervisor {
    fn from(h: HypervisorRecord) -> Self {
        Hypervisor {
            hostname: h.hypervisor_hostname,
            running_vms: h.running_vms.unwrap_or_default(),
            current_workload: h.current_workload.unwrap_or_default(),
            vcpus: h.vcpus.unwrap_or_default(),
            vcpus_used: h.vcpus_used.unwrap_or_default(),
            memory_mb: h.memory_mb.unwrap_or_default(),
            memory_mb_used: h.memory_mb_used.unwrap_or_default(),
            local_gb: h.local_gb.unwrap_or_default(),
            local_gb_used: h.local_gb_used.unwrap_or_default(),
            free_disk_gb: h.free_disk_gb.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AggregateList {
    pub aggregates: Vec<AggregateRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AggregateRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub hosts: Option<Vec<String>>,
}

impl From<AggregateRecord> for Aggregate {
    fn from(a: AggregateRecord) -> Self {
        Aggregate {
            name: a.name,
            availability_zone: a.availability_zone,
            hosts: a.hosts.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LimitsDocument {
    pub limits: LimitsBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LimitsBody {
    pub absolute: AbsoluteLimits,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct AbsoluteLimits {
    pub max_total_cores: i64,
    pub total_cores_used: i64,
    #[serde(rename = "maxTotalRAMSize")]
    pub max_total_ram_size: i64,
    #[serde(rename = "totalRAMUsed")]
    pub total_ram_used: i64,
    pub max_total_instances: i64,
    pub total_instances_used: i64,
}

impl From<AbsoluteLimits> for ComputeLimits {
    fn from(l: AbsoluteLimits) -> Self {
        ComputeLimits {
            max_total_cores: l.max_total_cores,
            total_cores_used: l.total_cores_used,
            max_total_ram_size: l.max_total_ram_size,
            total_ram_used: l.total_ram_used,
            max_total_instances: l.max_total_instances,
            total_instances_used: l.total_instances_used,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TenantUsageList {
    pub tenant_usages: Vec<TenantUsageRecord>,
    #[serde(default)]
    pub tenant_usages_links: Vec<Link>,
}

impl Page for TenantUsageList {
    type Item = TenantUsageRecord;

    fn into_parts(self) -> (Vec<TenantUsageRecord>, Option<String>) {
        let next = next_link(&self.tenant_usages_links);
        (self.tenant_usages, next)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TenantUsageRecord {
    #[serde(default)]
    pub server_usages: Vec<ServerUsageRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerUsageRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub instance_id: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub local_gb: u64,
}

impl From<ServerUsageRecord> for ServerUsage {
    fn from(u: ServerUsageRecord) -> Self {
        ServerUsage {
            name: u.name,
            instance_id: u.instance_id,
            tenant_id: u.tenant_id,
            local_gb: u.local_gb,
        }
    }
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_flavor_id_or_original_name() {
        let old: ServerRecord = serde_json::from_str(
            r#"{"id":"s1","status":"ACTIVE","flavor":{"id":"42","links":[]}}"#,
        )
        .unwrap();
        assert_eq!(Server::from(old).flavor_id, "42");

        let new: ServerRecord = serde_json::from_str(
            r#"{"id":"s2","flavor":{"original_name":"m1.small","vcpus":1},
                "OS-EXT-AZ:availability_zone":"nova",
                "OS-EXT-SRV-ATTR:hypervisor_hostname":null}"#,
        )
        .unwrap();
        let server = Server::from(new);
        assert_eq!(server.flavor_id, "m1.small");
        assert_eq!(server.availability_zone, "nova");
        assert_eq!(server.hypervisor_hostname, "");
    }

    #[test]
    fn service_ids_of_both_shapes() {
        let list: ServiceList = serde_json::from_str(
            r#"{"services":[
                {"id":7,"binary":"nova-compute","host":"cmp1","zone":"nova","status":"enabled","state":"up","disabled_reason":null},
                {"id":"5d9c-uuid","binary":"nova-scheduler","host":"ctl1","zone":"internal","status":"disabled","state":"down","disabled_reason":"maintenance"}
            ]}"#,
        )
        .unwrap();
        let services: Vec<ComputeService> = list.services.into_iter().map(Into::into).collect();
        assert_eq!(services[0].id, "7");
        assert_eq!(services[0].disabled_reason, "");
        assert_eq!(services[1].id, "5d9c-uuid");
        assert_eq!(services[1].disabled_reason, "maintenance");
    }

    #[test]
    fn catalog_lookup_respects_interface_and_region() {
        let token: TokenResponse = serde_json::from_str(
            r#"{"token":{"catalog":[
                {"type":"compute","endpoints":[
                    {"interface":"public","region_id":"RegionOne","url":"http://nova-one:8774/v2.1/"},
                    {"interface":"internal","region_id":"RegionOne","url":"http://nova-int:8774/v2.1"},
                    {"interface":"public","region_id":"RegionTwo","url":"http://nova-two:8774/v2.1"}
                ]}
            ]}}"#,
        )
        .unwrap();
        let body = token.token;
        assert_eq!(
            body.endpoint("compute", "public", Some("RegionTwo")).as_deref(),
            Some("http://nova-two:8774/v2.1")
        );
        assert_eq!(
            body.endpoint("compute", "public", None).as_deref(),
            Some("http://nova-one:8774/v2.1")
        );
        assert_eq!(
            body.endpoint("compute", "internal", Some("RegionOne")).as_deref(),
            Some("http://nova-int:8774/v2.1")
        );
        assert!(body.endpoint("identity", "public", None).is_none());
    }

    #[test]
    fn limits_document_field_names() {
        let doc: LimitsDocument = serde_json::from_str(
            r#"{"limits":{"rate":[],"absolute":{"maxTotalCores":20,"totalCoresUsed":4,
                "maxTotalRAMSize":51200,"totalRAMUsed":8192,
                "maxTotalInstances":10,"totalInstancesUsed":2}}}"#,
        )
        .unwrap();
        let limits = ComputeLimits::from(doc.limits.absolute);
        assert_eq!(limits.max_total_cores, 20);
        assert_eq!(limits.total_ram_used, 8192);
        assert_eq!(limits.total_instances_used, 2);
    }

    #[test]
    fn next_link_found() {
        let list: ServerList = serde_json::from_str(
            r#"{"servers":[],"servers_links":[{"rel":"next","href":"http://nova/servers/detail?marker=x"}]}"#,
        )
        .unwrap();
        assert_eq!(
            next_link(&list.servers_links).as_deref(),
            Some("http://nova/servers/detail?marker=x")
        );
        assert!(next_link(&[]).is_none());
    }

    fn next_of<P: Page>(json: &str) -> (usize, Option<String>) {
        let (items, next) = serde_json::from_str::<P>(json).unwrap().into_parts();
        (items.len(), next)
    }

    #[test]
    fn flavor_pages_link_onward() {
        let (n, next) = next_of::<FlavorList>(
            r#"{"flavors":[{"id":"1"}],"flavors_links":[{"rel":"next","href":"http://nova/flavors/detail?marker=1"}]}"#,
        );
        assert_eq!(n, 1);
        assert_eq!(next.as_deref(), Some("http://nova/flavors/detail?marker=1"));
        assert_eq!(next_of::<FlavorList>(r#"{"flavors":[]}"#), (0, None));
    }

    #[test]
    fn hypervisor_pages_link_onward() {
        let (n, next) = next_of::<HypervisorList>(
            r#"{"hypervisors":[{"hypervisor_hostname":"cmp-1"}],
                "hypervisors_links":[{"rel":"next","href":"http://nova/os-hypervisors/detail?marker=h1"}]}"#,
        );
        assert_eq!(n, 1);
        assert_eq!(next.as_deref(), Some("http://nova/os-hypervisors/detail?marker=h1"));
    }

    #[test]
    fn tenant_usage_pages_link_onward() {
        let (n, next) = next_of::<TenantUsageList>(
            r#"{"tenant_usages":[{"server_usages":[{"instance_id":"s1","local_gb":20}]}],
                "tenant_usages_links":[{"rel":"next","href":"http://nova/os-simple-tenant-usage?marker=t1"}]}"#,
        );
        assert_eq!(n, 1);
        assert_eq!(next.as_deref(), Some("http://nova/os-simple-tenant-usage?marker=t1"));
    }

    #[test]
    fn project_pages_follow_links_next() {
        let (n, next) = next_of::<ProjectList>(
            r#"{"projects":[{"id":"t1"}],
                "links":{"self":"http://keystone/v3/projects","next":"http://keystone/v3/projects?marker=t1"}}"#,
        );
        assert_eq!(n, 1);
        assert_eq!(next.as_deref(), Some("http://keystone/v3/projects?marker=t1"));

        let (_, last) = next_of::<ProjectList>(
            r#"{"projects":[],"links":{"self":"http://keystone/v3/projects","next":null}}"#,
        );
        assert!(last.is_none());
        assert_eq!(next_of::<ProjectList>(r#"{"projects":[]}"#), (0, None));
    }
}
