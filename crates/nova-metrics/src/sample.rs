//! Samples and the write-only conduit producers emit through.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;

use crate::error::{ProducerError, ProducerResult};

/// Descriptor of one registered metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDesc {
    /// Fully qualified name, e.g. `openstack_nova_total_vms`.
    pub name: String,
    /// Catalog name, e.g. `total_vms`.
    pub short: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

/// One `(metric, label values, value)` tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub desc: Arc<MetricDesc>,
    /// Positional, matching `desc.labels`.
    pub labels: Vec<String>,
    pub value: f64,
}

impl Sample {
    pub fn name(&self) -> &str {
        &self.desc.name
    }
}

/// Descriptor lookup by catalog name. `None` marks a metric that is in
/// the catalog but filtered out by policy.
pub(crate) type DescTable = HashMap<&'static str, Option<Arc<MetricDesc>>>;

/// Handed to a producer for the duration of one `produce` call.
pub struct SampleSink<'a> {
    descs: &'a DescTable,
    tx: &'a mpsc::Sender<Sample>,
    sent: AtomicUsize,
}

impl<'a> SampleSink<'a> {
    pub(crate) fn new(descs: &'a DescTable, tx: &'a mpsc::Sender<Sample>) -> Self {
        Self {
            descs,
            tx,
            sent: AtomicUsize::new(0),
        }
    }

    /// Write one sample, waiting for room on the channel.
    ///
    /// Writes to a metric the policy filtered out are dropped.
    ///
    /// # Panics
    ///
    /// If `name` is not in the catalog, or if `labels` does not have one
    /// value per declared label. Both are bugs in the producer.
    pub async fn emit(&self, name: &str, labels: &[&str], value: f64) -> ProducerResult<()> {
        let desc = match self.descs.get(name) {
            Some(Some(desc)) => desc,
            Some(None) => return Ok(()),
            None => panic!("emit to unknown metric {name:?}"),
        };
        assert_eq!(
            labels.len(),
            desc.labels.len(),
            "metric {name:?} declares labels {:?}, got {} values",
            desc.labels,
            labels.len()
        );

        let sample = Sample {
            desc: Arc::clone(desc),
            labels: labels.iter().map(|v| v.to_string()).collect(),
            value,
        };
        self.tx
            .send(sample)
            .await
            .map_err(|_| ProducerError::ChannelClosed)?;
        self.sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Whether `name` is active under the current policy.
    pub fn is_active(&self, name: &str) -> bool {
        matches!(self.descs.get(name), Some(Some(_)))
    }

    /// Samples written so far.
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::Relaxed)
    }
}
