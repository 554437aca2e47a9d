//! nova-core: shared vocabulary for the Nova exporter.
//!
//! Holds the records read from the identity and compute APIs, the
//! compute microversion type used for deprecation policy, and the TOML
//! configuration consumed by the rest of the workspace.

pub mod config;
pub mod error;
pub mod types;
pub mod version;

pub use config::{CloudConfig, Config, ExporterSettings, Interface, parse_duration};
pub use error::{CoreError, CoreResult};
pub use types::*;
pub use version::ApiVersion;
