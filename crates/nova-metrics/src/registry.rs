//! The exporter: an immutable active metric set plus the collection pass.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use nova_client::CloudClient;
use nova_core::ApiVersion;
use nova_teams::TeamCache;

use crate::error::{CatalogError, ProducerError};
use crate::metric::{MetricSpec, Policy, Producer};
use crate::sample::{DescTable, MetricDesc, Sample, SampleSink};

/// Catalog name of the per-scrape health gauge.
pub const UP_METRIC: &str = "up";

/// Construction-time settings for an [`Exporter`].
#[derive(Debug, Clone)]
pub struct ExporterOptions {
    /// Leading namespace, e.g. `openstack`.
    pub prefix: String,
    /// Service segment, e.g. `nova`.
    pub service: String,
    pub api_version: ApiVersion,
    pub include_expensive: bool,
    /// Bound of the sample channel used by [`crate::scrape`].
    pub channel_capacity: usize,
}

impl Default for ExporterOptions {
    fn default() -> Self {
        Self {
            prefix: "openstack".into(),
            service: "nova".into(),
            api_version: ApiVersion::BASE,
            include_expensive: false,
            channel_capacity: 256,
        }
    }
}

impl ExporterOptions {
    pub fn policy(&self) -> Policy {
        Policy {
            api_version: self.api_version,
            include_expensive: self.include_expensive,
        }
    }

    fn qualify(&self, short: &str) -> String {
        format!("{}_{}_{}", self.prefix, self.service, short)
    }
}

struct ActiveMetric {
    spec: MetricSpec,
    desc: Arc<MetricDesc>,
}

/// Outcome of one [`Exporter::collect`] pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectReport {
    /// Producers invoked.
    pub producers: usize,
    /// Catalog names of producers that returned an error.
    pub failed: Vec<&'static str>,
    /// Samples written, the `up` sample included.
    pub samples: usize,
    /// The consumer hung up before the pass finished.
    pub interrupted: bool,
}

impl CollectReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.interrupted
    }
}

/// Owns the active metric set and runs producers on demand.
///
/// Built once at startup; the active set never changes afterwards.
pub struct Exporter {
    options: ExporterOptions,
    client: Arc<dyn CloudClient>,
    teams: TeamCache,
    active: Vec<ActiveMetric>,
    descs: DescTable,
    up: Arc<MetricDesc>,
}

impl Exporter {
    /// Validate `catalog` and keep the entries `options` admits.
    pub fn new(
        catalog: Vec<MetricSpec>,
        options: ExporterOptions,
        client: Arc<dyn CloudClient>,
        teams: TeamCache,
    ) -> Result<Self, CatalogError> {
        validate_name(&options.qualify(UP_METRIC))?;

        let mut seen = HashSet::new();
        seen.insert(UP_METRIC);
        for spec in &catalog {
            if !seen.insert(spec.name) {
                return Err(CatalogError::DuplicateMetric(spec.name.to_string()));
            }
            validate_name(&options.qualify(spec.name))?;
        }
        for spec in &catalog {
            if let Some(producer) = spec.producer() {
                check_emits(spec.name, producer.as_ref(), &seen)?;
            }
        }

        let policy = options.policy();
        let mut descs = HashMap::with_capacity(catalog.len());
        let mut active = Vec::new();
        for spec in catalog {
            if !policy.admits(&spec) {
                debug!(metric = spec.name, "metric filtered out by policy");
                descs.insert(spec.name, None);
                continue;
            }
            let desc = Arc::new(MetricDesc {
                name: options.qualify(spec.name),
                short: spec.name,
                help: spec.help,
                labels: spec.labels,
            });
            descs.insert(spec.name, Some(Arc::clone(&desc)));
            active.push(ActiveMetric { spec, desc });
        }

        let up = Arc::new(MetricDesc {
            name: options.qualify(UP_METRIC),
            short: UP_METRIC,
            help: "Whether every producer succeeded on the last scrape.",
            labels: &[],
        });

        info!(
            api_version = %options.api_version,
            include_expensive = options.include_expensive,
            active = active.len(),
            "exporter built"
        );

        Ok(Self {
            options,
            client,
            teams,
            active,
            descs,
            up,
        })
    }

    pub fn client(&self) -> &dyn CloudClient {
        self.client.as_ref()
    }

    pub fn teams(&self) -> &TeamCache {
        &self.teams
    }

    pub fn api_version(&self) -> ApiVersion {
        self.options.api_version
    }

    pub fn options(&self) -> &ExporterOptions {
        &self.options
    }

    /// Descriptors of the active set in catalog order.
    pub fn descriptors(&self) -> impl Iterator<Item = &MetricDesc> {
        self.active.iter().map(|m| m.desc.as_ref())
    }

    /// Descriptor of an active metric by catalog name.
    pub fn descriptor(&self, name: &str) -> Option<&MetricDesc> {
        self.descs.get(name).and_then(|d| d.as_deref())
    }

    /// Active specs in catalog order.
    pub fn active_specs(&self) -> impl Iterator<Item = &MetricSpec> {
        self.active.iter().map(|m| &m.spec)
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.descriptor(name).is_some()
    }

    /// Run every active producer once, in catalog order, writing samples
    /// to `tx`. A failing producer is logged and skipped; the samples it
    /// wrote before failing stay. Ends with the `up` sample.
    pub async fn collect(&self, tx: &mpsc::Sender<Sample>) -> CollectReport {
        let mut report = CollectReport::default();

        for metric in &self.active {
            let Some(producer) = metric.spec.producer() else {
                continue;
            };
            let sink = SampleSink::new(&self.descs, tx);
            let started = Instant::now();
            let result = producer.produce(self, &sink).await;
            report.producers += 1;
            report.samples += sink.sent();

            match result {
                Ok(()) => debug!(
                    metric = metric.spec.name,
                    samples = sink.sent(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "producer finished"
                ),
                Err(ProducerError::ChannelClosed) => {
                    debug!(metric = metric.spec.name, "sample consumer went away");
                    report.interrupted = true;
                    return report;
                }
                Err(e) => {
                    warn!(metric = metric.spec.name, error = %e, "producer failed");
                    report.failed.push(metric.spec.name);
                }
            }
        }

        let up = Sample {
            desc: Arc::clone(&self.up),
            labels: Vec::new(),
            value: if report.failed.is_empty() { 1.0 } else { 0.0 },
        };
        if tx.send(up).await.is_ok() {
            report.samples += 1;
        } else {
            report.interrupted = true;
        }
        report
    }
}

/// Pick the compute microversion to run with and pin it on `client`.
///
/// An explicit override wins. Otherwise the version the endpoint
/// advertises is used, falling back to the base version if discovery
/// fails.
pub async fn resolve_api_version(
    override_version: Option<ApiVersion>,
    client: &dyn CloudClient,
) -> ApiVersion {
    let version = match override_version {
        Some(v) => {
            info!(version = %v, "using configured compute microversion");
            v
        }
        None => match client.api_version().await {
            Ok(v) => {
                info!(version = %v, "discovered compute microversion");
                v
            }
            Err(e) => {
                warn!(error = %e, fallback = %ApiVersion::BASE, "microversion discovery failed");
                ApiVersion::BASE
            }
        },
    };
    client.use_microversion(version);
    version
}

fn check_emits(
    owner: &'static str,
    producer: &dyn Producer,
    known: &HashSet<&'static str>,
) -> Result<(), CatalogError> {
    for &metric in producer.emits() {
        if !known.contains(metric) {
            return Err(CatalogError::UnknownMetric {
                producer: owner,
                metric,
            });
        }
    }
    Ok(())
}

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
fn validate_name(name: &str) -> Result<(), CatalogError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(CatalogError::InvalidName(name.to_string()))
    }
}
