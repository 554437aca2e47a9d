use async_trait::async_trait;
use tracing::debug;

use crate::error::ProducerResult;
use crate::metric::Producer;
use crate::registry::Exporter;
use crate::sample::SampleSink;

/// Per-tenant absolute compute limits. One limits call per tenant, hence
/// expensive.
pub struct ComputeLimits;

#[async_trait]
impl Producer for ComputeLimits {
    fn emits(&self) -> &'static [&'static str] {
        &[
            "limits_vcpus_max",
            "limits_vcpus_used",
            "limits_memory_max",
            "limits_memory_used",
            "limits_instances_used",
            "limits_instances_max",
        ]
    }

    async fn produce(&self, exporter: &Exporter, out: &SampleSink<'_>) -> ProducerResult<()> {
        let client = exporter.client();
        let tenants = client.list_tenants().await?;
        debug!(tenants = tenants.len(), "fetching compute limits");

        for t in &tenants {
            let l = client.compute_limits(&t.id).await?;
            let labels = [t.name.as_str(), t.id.as_str()];
            // Memory stays in MiB as reported.
            let values = [
                ("limits_vcpus_max", l.max_total_cores),
                ("limits_vcpus_used", l.total_cores_used),
                ("limits_memory_max", l.max_total_ram_size),
                ("limits_memory_used", l.total_ram_used),
                ("limits_instances_used", l.total_instances_used),
                ("limits_instances_max", l.max_total_instances),
            ];
            for (name, value) in values {
                out.emit(name, &labels, value as f64).await?;
            }
        }
        Ok(())
    }
}
