//! Cloud client error types.

use thiserror::Error;

use crate::client::Operation;

pub type ClientResult<T> = Result<T, ClientError>;

/// Failures talking to the identity or compute service.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid endpoint URL {0:?}")]
    InvalidUrl(String),

    #[error("tls setup failed: {0}")]
    Tls(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("no {service} endpoint with interface {interface} in the service catalog")]
    EndpointNotFound { service: String, interface: String },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("{0} failed (injected)")]
    Injected(Operation),

    #[error("fixture error: {0}")]
    Fixture(String),
}
