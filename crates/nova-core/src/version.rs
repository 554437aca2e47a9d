//! Compute API microversions.
//!
//! Nova advertises versions as `major.minor` strings. Ordering is
//! numeric per component, so `2.9 < 2.53`, which a plain string
//! comparison gets wrong.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// A `major.minor` compute API microversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
}

impl ApiVersion {
    /// The base microversion every v2.1 endpoint supports.
    pub const BASE: ApiVersion = ApiVersion::new(2, 1);

    /// Sentinel for the `latest` keyword; compares above every real version.
    pub const LATEST: ApiVersion = ApiVersion::new(u32::MAX, u32::MAX);

    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub fn is_latest(&self) -> bool {
        *self == Self::LATEST
    }
}

impl Default for ApiVersion {
    fn default() -> Self {
        Self::BASE
    }
}

impl FromStr for ApiVersion {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("latest") {
            return Ok(Self::LATEST);
        }
        // Version ids in the discovery document carry a leading "v".
        let body = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let (major, minor) = body
            .split_once('.')
            .ok_or_else(|| CoreError::InvalidVersion(s.to_string()))?;
        let major = major
            .parse()
            .map_err(|_| CoreError::InvalidVersion(s.to_string()))?;
        let minor = minor
            .parse()
            .map_err(|_| CoreError::InvalidVersion(s.to_string()))?;
        Ok(Self { major, minor })
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_latest() {
            f.write_str("latest")
        } else {
            write!(f, "{}.{}", self.major, self.minor)
        }
    }
}

impl Serialize for ApiVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ApiVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
