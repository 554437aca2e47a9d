//! Metric definitions and the policy that selects which are active.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use nova_core::ApiVersion;

use crate::error::ProducerResult;
use crate::registry::Exporter;
use crate::sample::SampleSink;

/// Fetches current state and writes samples for one metric family.
#[async_trait]
pub trait Producer: Send + Sync {
    /// Every metric name this producer writes to, its own included.
    /// Checked against the catalog when the exporter is built.
    fn emits(&self) -> &'static [&'static str];

    /// Run one data pass. Samples already written stay written if this
    /// returns an error part-way through.
    async fn produce(&self, exporter: &Exporter, out: &SampleSink<'_>) -> ProducerResult<()>;
}

/// Where a metric's values come from.
#[derive(Clone)]
pub enum Emitter {
    /// The metric's own producer, invoked once per scrape.
    Producer(Arc<dyn Producer>),
    /// Written by a sibling's producer; this entry only declares the
    /// descriptor and label schema.
    Shared,
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Emitter::Producer(p) => f
                .debug_tuple("Producer")
                .field(&p.emits())
                .finish(),
            Emitter::Shared => f.write_str("Shared"),
        }
    }
}

/// Declarative description of one exportable metric.
#[derive(Debug, Clone)]
pub struct MetricSpec {
    pub name: &'static str,
    pub help: &'static str,
    /// Label keys, in the positional order values are emitted.
    pub labels: &'static [&'static str],
    pub emitter: Emitter,
    /// Dropped once the running microversion reaches this version.
    pub deprecated_since: Option<ApiVersion>,
    /// Only active when expensive metrics are enabled.
    pub expensive: bool,
}

impl MetricSpec {
    /// A label-less metric with no producer of its own.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            help: "",
            labels: &[],
            emitter: Emitter::Shared,
            deprecated_since: None,
            expensive: false,
        }
    }

    pub fn help(mut self, help: &'static str) -> Self {
        self.help = help;
        self
    }

    pub fn labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    pub fn produced_by<P: Producer + 'static>(mut self, producer: P) -> Self {
        self.emitter = Emitter::Producer(Arc::new(producer));
        self
    }

    pub fn deprecated_since(mut self, version: ApiVersion) -> Self {
        self.deprecated_since = Some(version);
        self
    }

    pub fn expensive(mut self) -> Self {
        self.expensive = true;
        self
    }

    pub fn producer(&self) -> Option<&Arc<dyn Producer>> {
        match &self.emitter {
            Emitter::Producer(p) => Some(p),
            Emitter::Shared => None,
        }
    }
}

/// Which catalog entries are active for a running exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub api_version: ApiVersion,
    pub include_expensive: bool,
}

impl Policy {
    pub fn admits(&self, spec: &MetricSpec) -> bool {
        if let Some(since) = spec.deprecated_since {
            if self.api_version >= since {
                return false;
            }
        }
        !spec.expensive || self.include_expensive
    }

    /// The active subset of `catalog`, in catalog order.
    pub fn filter<'a>(&self, catalog: &'a [MetricSpec]) -> Vec<&'a MetricSpec> {
        catalog.iter().filter(|spec| self.admits(spec)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(version: &str, include_expensive: bool) -> Policy {
        Policy {
            api_version: version.parse().unwrap(),
            include_expensive,
        }
    }

    fn names(specs: &[&MetricSpec]) -> Vec<&'static str> {
        specs.iter().map(|s| s.name).collect()
    }

    fn sample_catalog() -> Vec<MetricSpec> {
        vec![
            MetricSpec::new("a"),
            MetricSpec::new("old").deprecated_since(ApiVersion::new(2, 53)),
            MetricSpec::new("slow").expensive(),
            MetricSpec::new("old_and_slow")
                .deprecated_since(ApiVersion::new(2, 53))
                .expensive(),
            MetricSpec::new("z"),
        ]
    }

    #[test]
    fn deprecated_excluded_at_or_above_version() {
        let catalog = sample_catalog();
        assert!(!names(&policy("2.53", false).filter(&catalog)).contains(&"old"));
        assert!(!names(&policy("2.60", false).filter(&catalog)).contains(&"old"));
        assert!(!names(&policy("latest", false).filter(&catalog)).contains(&"old"));
        assert!(names(&policy("2.52", false).filter(&catalog)).contains(&"old"));
        // Numeric, not lexical: 2.9 is below 2.53.
        assert!(names(&policy("2.9", false).filter(&catalog)).contains(&"old"));
    }

    #[test]
    fn expensive_needs_opt_in() {
        let catalog = sample_catalog();
        assert_eq!(
            names(&policy("2.1", false).filter(&catalog)),
            vec!["a", "old", "z"]
        );
        assert_eq!(
            names(&policy("2.1", true).filter(&catalog)),
            vec!["a", "old", "slow", "old_and_slow", "z"]
        );
        // Deprecation wins over the opt-in.
        assert_eq!(
            names(&policy("2.53", true).filter(&catalog)),
            vec!["a", "slow", "z"]
        );
    }

    #[test]
    fn filtering_is_deterministic() {
        let catalog = sample_catalog();
        for version in ["2.1", "2.53", "2.90"] {
            for expensive in [false, true] {
                let p = policy(version, expensive);
                assert_eq!(names(&p.filter(&catalog)), names(&p.filter(&catalog)));
            }
        }
    }

    #[test]
    fn builder_sets_fields() {
        let spec = MetricSpec::new("x")
            .help("an x")
            .labels(&["a", "b"])
            .expensive();
        assert_eq!(spec.labels, &["a", "b"]);
        assert!(spec.expensive);
        assert!(spec.producer().is_none());
        assert_eq!(format!("{:?}", spec.emitter), "Shared");
    }
}
