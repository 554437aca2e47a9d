//! nova-metrics: the exporter's metric registry.
//!
//! A static, ordered catalog of [`MetricSpec`]s describes every metric
//! the exporter knows. At startup the catalog is filtered against the
//! running compute microversion and the expensive-metrics toggle, and
//! the survivors become the active set of an [`Exporter`]. Each scrape
//! then runs every active producer once and streams its samples over a
//! bounded channel to the renderer.
//!
//! # Architecture
//!
//! ```text
//! nova_catalog() ──► Policy::filter() ──► Exporter (active set, descriptors)
//!                                            │
//! scrape() ──► Exporter::collect() ──► Producer::produce() × N
//!                                            │  SampleSink::emit()
//!                                            ▼
//!                                  mpsc::Sender<Sample> ──► render_prometheus()
//! ```
//!
//! Metrics that share a data pass (the hypervisor family, the compute
//! limits family, `flavors`/`flavor`) are declared with
//! [`Emitter::Shared`]: they get a descriptor but no producer of their
//! own, and a sibling's producer writes them by name.

pub mod catalog;
pub mod error;
pub mod exposition;
pub mod metric;
pub mod producers;
pub mod registry;
pub mod sample;

pub use catalog::nova_catalog;
pub use error::{CatalogError, ProducerError, ProducerResult};
pub use exposition::{render_prometheus, scrape};
pub use metric::{Emitter, MetricSpec, Policy, Producer};
pub use registry::{CollectReport, Exporter, ExporterOptions, resolve_api_version};
pub use sample::{MetricDesc, Sample, SampleSink};
