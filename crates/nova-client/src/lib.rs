//! nova-client: the exporter's view of the cloud control plane.
//!
//! The exporter never talks HTTP directly. Everything it needs from the
//! identity and compute services goes through the [`CloudClient`] trait,
//! which has two implementations:
//!
//! ```text
//! CloudClient
//!   ├── HttpCloudClient   Keystone v3 password/token auth + Nova v2.1
//!   └── StaticCloudClient in-memory snapshot with failure injection
//! ```
//!
//! Every HTTP call is bounded by the configured `cloud.timeout`.

pub mod client;
pub mod error;
pub mod rest;
pub mod static_client;
mod wire;

pub use client::{CloudClient, Operation};
pub use error::{ClientError, ClientResult};
pub use rest::HttpCloudClient;
pub use static_client::{CloudSnapshot, StaticCloudClient};
