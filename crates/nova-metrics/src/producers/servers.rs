use async_trait::async_trait;

use crate::error::ProducerResult;
use crate::metric::Producer;
use crate::registry::Exporter;
use crate::sample::SampleSink;

/// Ordinal for a status string not in the table.
pub const UNKNOWN_STATUS: i32 = -1;

const STATUSES: &[(&str, i32)] = &[
    ("ACTIVE", 0),
    ("BUILD", 1),
    ("BUILD(spawning)", 2),
    ("DELETED", 3),
    ("ERROR", 4),
    ("HARD_REBOOT", 5),
    ("MIGRATING", 6),
    ("PASSWORD", 7),
    ("PAUSED", 8),
    ("REBOOT", 9),
    ("REBUILD", 10),
    ("RESCUE", 11),
    ("RESIZE", 12),
    ("REVERT_RESIZE", 13),
    ("SHELVED", 14),
    ("SHELVED_OFFLOADED", 15),
    ("SHUTOFF", 16),
    ("SOFT_DELETED", 17),
    ("SUSPENDED", 18),
    ("UNKNOWN", 19),
    ("VERIFY_RESIZE", 20),
];

/// Gauge value for a server status. Exact match; anything unrecognised
/// is [`UNKNOWN_STATUS`].
pub fn status_ordinal(status: &str) -> i32 {
    STATUSES
        .iter()
        .find(|(name, _)| *name == status)
        .map_or(UNKNOWN_STATUS, |(_, ordinal)| *ordinal)
}

/// `total_vms` plus one `server_status` per server, tagged with the
/// owning tenant's team.
pub struct Servers;

#[async_trait]
impl Producer for Servers {
    fn emits(&self) -> &'static [&'static str] {
        &["total_vms", "server_status"]
    }

    async fn produce(&self, exporter: &Exporter, out: &SampleSink<'_>) -> ProducerResult<()> {
        let servers = exporter.client().list_servers(true).await?;
        out.emit("total_vms", &[], servers.len() as f64).await?;

        // One generation for the whole pass.
        let teams = exporter.teams().snapshot();
        for s in &servers {
            out.emit(
                "server_status",
                &[
                    s.id.as_str(),
                    s.status.as_str(),
                    s.name.as_str(),
                    s.tenant_id.as_str(),
                    s.user_id.as_str(),
                    s.access_ipv4.as_str(),
                    s.access_ipv6.as_str(),
                    s.host_id.as_str(),
                    s.hypervisor_hostname.as_str(),
                    s.id.as_str(),
                    s.availability_zone.as_str(),
                    s.flavor_id.as_str(),
                    teams.team(&s.tenant_id),
                ],
                f64::from(status_ordinal(&s.status)),
            )
            .await?;
        }
        Ok(())
    }
}
