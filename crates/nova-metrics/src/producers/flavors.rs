use async_trait::async_trait;

use crate::error::ProducerResult;
use crate::metric::Producer;
use crate::registry::Exporter;
use crate::sample::SampleSink;

/// `flavors` count plus one `flavor` sample per flavor.
pub struct Flavors;

#[async_trait]
impl Producer for Flavors {
    fn emits(&self) -> &'static [&'static str] {
        &["flavors", "flavor"]
    }

    async fn produce(&self, exporter: &Exporter, out: &SampleSink<'_>) -> ProducerResult<()> {
        let flavors = exporter.client().list_flavors().await?;
        out.emit("flavors", &[], flavors.len() as f64).await?;

        for f in &flavors {
            let vcpus = f.vcpus.to_string();
            let ram = f.ram.to_string();
            let disk = f.disk.to_string();
            let is_public = f.is_public.to_string();
            out.emit(
                "flavor",
                &[
                    f.id.as_str(),
                    f.name.as_str(),
                    vcpus.as_str(),
                    ram.as_str(),
                    disk.as_str(),
                    is_public.as_str(),
                ],
                1.0,
            )
            .await?;
        }
        Ok(())
    }
}
