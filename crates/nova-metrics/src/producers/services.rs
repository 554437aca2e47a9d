use async_trait::async_trait;

use crate::error::ProducerResult;
use crate::metric::Producer;
use crate::registry::Exporter;
use crate::sample::SampleSink;

/// One `agent_state` per compute service: 1 when the scheduler sees it
/// up, 0 otherwise.
pub struct AgentState;

#[async_trait]
impl Producer for AgentState {
    fn emits(&self) -> &'static [&'static str] {
        &["agent_state"]
    }

    async fn produce(&self, exporter: &Exporter, out: &SampleSink<'_>) -> ProducerResult<()> {
        let services = exporter.client().list_compute_services().await?;
        for s in &services {
            let value = if s.state == "up" { 1.0 } else { 0.0 };
            out.emit(
                "agent_state",
                &[
                    s.id.as_str(),
                    s.host.as_str(),
                    s.binary.as_str(),
                    s.status.as_str(),
                    s.zone.as_str(),
                    s.disabled_reason.as_str(),
                ],
                value,
            )
            .await?;
        }
        Ok(())
    }
}
