use async_trait::async_trait;

use crate::error::{ProducerError, ProducerResult};
use crate::metric::Producer;
use crate::registry::Exporter;
use crate::sample::SampleSink;

/// Local disk per server from the simple tenant usage report.
pub struct ServerUsage;

#[async_trait]
impl Producer for ServerUsage {
    fn emits(&self) -> &'static [&'static str] {
        &["server_local_gb"]
    }

    async fn produce(&self, exporter: &Exporter, out: &SampleSink<'_>) -> ProducerResult<()> {
        let usage = exporter.client().list_server_usage().await?;
        for u in &usage {
            if u.instance_id.is_empty() {
                return Err(ProducerError::Malformed(format!(
                    "usage entry {:?} has no instance id",
                    u.name
                )));
            }
            out.emit(
                "server_local_gb",
                &[u.name.as_str(), u.instance_id.as_str(), u.tenant_id.as_str()],
                u.local_gb as f64,
            )
            .await?;
        }
        Ok(())
    }
}
