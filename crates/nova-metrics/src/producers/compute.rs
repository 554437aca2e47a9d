use async_trait::async_trait;

use crate::error::ProducerResult;
use crate::metric::Producer;
use crate::registry::Exporter;
use crate::sample::SampleSink;

pub struct AvailabilityZones;

#[async_trait]
impl Producer for AvailabilityZones {
    fn emits(&self) -> &'static [&'static str] {
        &["availability_zones"]
    }

    async fn produce(&self, exporter: &Exporter, out: &SampleSink<'_>) -> ProducerResult<()> {
        let zones = exporter.client().list_availability_zones().await?;
        out.emit("availability_zones", &[], zones.len() as f64).await
    }
}

/// Nova's security group proxy API; gone from microversion 2.36 on.
pub struct SecurityGroups;

#[async_trait]
impl Producer for SecurityGroups {
    fn emits(&self) -> &'static [&'static str] {
        &["security_groups"]
    }

    async fn produce(&self, exporter: &Exporter, out: &SampleSink<'_>) -> ProducerResult<()> {
        let groups = exporter.client().list_security_groups().await?;
        out.emit("security_groups", &[], groups.len() as f64).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use nova_client::{CloudSnapshot, Operation, StaticCloudClient};
    use nova_core::{ApiVersion, AvailabilityZone, SecurityGroup};
    use nova_teams::TeamCache;

    use crate::producers::testing::{collect, collect_snapshot, of};
    use crate::{Exporter, ExporterOptions, nova_catalog};

    fn snapshot() -> CloudSnapshot {
        CloudSnapshot {
            availability_zones: vec![
                AvailabilityZone {
                    name: "nova".into(),
                    available: true,
                },
                AvailabilityZone {
                    name: "az2".into(),
                    available: false,
                },
            ],
            security_groups: vec![SecurityGroup {
                id: "sg1".into(),
                name: "default".into(),
                tenant_id: "t1".into(),
            }],
            ..CloudSnapshot::default()
        }
    }

    #[tokio::test]
    async fn counts_zones_and_groups() {
        let (_, samples) = collect_snapshot(snapshot(), false).await;
        assert_eq!(of(&samples, "availability_zones")[0].value, 2.0);
        assert_eq!(of(&samples, "security_groups")[0].value, 1.0);
    }

    #[tokio::test]
    async fn security_groups_not_queried_from_2_36() {
        let client = Arc::new(StaticCloudClient::new(snapshot()));
        let options = ExporterOptions {
            api_version: ApiVersion::new(2, 36),
            ..ExporterOptions::default()
        };
        let exporter =
            Exporter::new(nova_catalog(), options, client.clone(), TeamCache::new("-team")).unwrap();
        let (report, samples) = collect(&exporter).await;

        assert!(report.is_success());
        assert!(of(&samples, "security_groups").is_empty());
        assert_eq!(client.calls(Operation::ListSecurityGroups), 0);
    }
}
