//! Registry and producer error types.

use thiserror::Error;

use nova_client::ClientError;

/// Inconsistent catalogs. Raised while building an exporter, before
/// any scrape runs.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("metric {0:?} is defined more than once")]
    DuplicateMetric(String),

    #[error("metric name {0:?} is not a valid Prometheus name")]
    InvalidName(String),

    #[error("producer of {producer:?} emits {metric:?}, which is not in the catalog")]
    UnknownMetric {
        producer: &'static str,
        metric: &'static str,
    },
}

pub type ProducerResult<T> = Result<T, ProducerError>;

/// Why a producer gave up on this scrape.
#[derive(Debug, Error)]
pub enum ProducerError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("malformed record: {0}")]
    Malformed(String),

    /// The consumer went away; nothing more can be delivered this pass.
    #[error("sample channel closed")]
    ChannelClosed,
}
