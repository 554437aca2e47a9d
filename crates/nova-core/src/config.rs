//! nova-exporter.toml configuration parser.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::version::ApiVersion;

/// Environment variable that overrides the compute microversion.
pub const COMPUTE_API_VERSION_ENV: &str = "OS_COMPUTE_API_VERSION";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cloud: CloudConfig,
    #[serde(default)]
    pub exporter: ExporterSettings,
}

/// Where and how to reach the cloud.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    pub auth_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub project_name: Option<String>,
    pub user_domain_name: String,
    pub project_domain_name: String,
    pub region_name: Option<String>,
    pub interface: Interface,
    /// Pre-issued token; skips password authentication when set.
    pub token: Option<String>,
    pub compute_endpoint: Option<String>,
    pub identity_endpoint: Option<String>,
    /// Upper bound for every individual API call.
    pub timeout: String,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            auth_url: None,
            username: None,
            password: None,
            project_name: None,
            user_domain_name: "Default".to_string(),
            project_domain_name: "Default".to_string(),
            region_name: None,
            interface: Interface::Public,
            token: None,
            compute_endpoint: None,
            identity_endpoint: None,
            timeout: "10s".to_string(),
        }
    }
}

impl CloudConfig {
    pub fn timeout(&self) -> CoreResult<Duration> {
        parse_duration(&self.timeout)
    }
}

/// Service catalog endpoint interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interface {
    #[default]
    Public,
    Internal,
    Admin,
}

impl Interface {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interface::Public => "public",
            Interface::Internal => "internal",
            Interface::Admin => "admin",
        }
    }
}

/// Exporter behaviour knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterSettings {
    /// Metric name prefix; the service name follows it.
    pub prefix: String,
    /// Include metrics whose producers issue costly API calls.
    pub collect_expensive: bool,
    /// Fixed compute microversion instead of discovery.
    pub compute_api_version: Option<ApiVersion>,
    /// Tags ending in this suffix name the owning team of a tenant.
    pub team_suffix: String,
    pub team_refresh_interval: String,
    /// First retry delay after a failed refresh; doubles up to the interval.
    pub team_retry_delay: String,
    pub listen: String,
    /// Bound of the sample channel between producers and the renderer.
    pub channel_capacity: usize,
}

impl Default for ExporterSettings {
    fn default() -> Self {
        Self {
            prefix: "openstack".to_string(),
            collect_expensive: false,
            compute_api_version: None,
            team_suffix: "-team".to_string(),
            team_refresh_interval: "5m".to_string(),
            team_retry_delay: "5s".to_string(),
            listen: "0.0.0.0:9180".to_string(),
            channel_capacity: 256,
        }
    }
}

impl ExporterSettings {
    pub fn team_refresh_interval(&self) -> CoreResult<Duration> {
        parse_duration(&self.team_refresh_interval)
    }

    pub fn team_retry_delay(&self) -> CoreResult<Duration> {
        parse_duration(&self.team_retry_delay)
    }

    pub fn listen_addr(&self) -> CoreResult<SocketAddr> {
        self.listen
            .parse()
            .map_err(|_| CoreError::Invalid(format!("listen address {:?}", self.listen)))
    }
}

impl Config {
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CoreError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> CoreResult<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env<F>(&mut self, lookup: F) -> CoreResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(COMPUTE_API_VERSION_ENV) {
            if !raw.trim().is_empty() {
                self.exporter.compute_api_version = Some(raw.parse()?);
            }
        }
        Ok(())
    }

    /// Check everything that can be checked without touching the network.
    pub fn validate(&self) -> CoreResult<()> {
        self.cloud.timeout()?;
        self.exporter.team_refresh_interval()?;
        self.exporter.team_retry_delay()?;
        self.exporter.listen_addr()?;
        if self.exporter.prefix.is_empty() {
            return Err(CoreError::Invalid("exporter.prefix must not be empty".into()));
        }
        if self.exporter.team_suffix.is_empty() {
            return Err(CoreError::Invalid("exporter.team_suffix must not be empty".into()));
        }
        if self.exporter.channel_capacity == 0 {
            return Err(CoreError::Invalid("exporter.channel_capacity must be positive".into()));
        }
        Ok(())
    }
}

/// Parse a duration string like "500ms", "10s", "5m", "1h".
pub fn parse_duration(s: &str) -> CoreResult<Duration> {
    let s = s.trim();
    let invalid = || CoreError::InvalidDuration(s.to_string());
    let (digits, unit_secs) = if let Some(ms) = s.strip_suffix("ms") {
        let ms = ms.parse::<u64>().map_err(|_| invalid())?;
        return nonzero(Duration::from_millis(ms)).ok_or_else(invalid);
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60)
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, 3600)
    } else {
        (s, 1)
    };
    let secs = digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(unit_secs))
        .ok_or_else(invalid)?;
    nonzero(Duration::from_secs(secs)).ok_or_else(invalid)
}

fn nonzero(duration: Duration) -> Option<Duration> {
    (!duration.is_zero()).then_some(duration)
}
