//! KSeF environments and their verification service endpoints

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// KSeF environment a verification link points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Environment {
    /// Public test environment
    Test,
    /// Pre-production (demo) environment
    Demo,
    /// Production environment
    Production,
}

impl Environment {
    /// Every supported environment
    pub const ALL: [Environment; 3] = [Self::Test, Self::Demo, Self::Production];

    /// Base URL of the QR verification service, without a trailing slash.
    pub fn base_url(self) -> &'static str {
        match self {
            Self::Test => "https://qr-test.ksef.mf.gov.pl",
            Self::Demo => "https://qr-demo.ksef.mf.gov.pl",
            Self::Production => "https://qr.ksef.mf.gov.pl",
        }
    }

    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            Self::Test => "KSeF test",
            Self::Demo => "KSeF demo",
            Self::Production => "KSeF production",
        }
    }

    /// Short tag accepted by [`Environment::parse`]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Demo => "demo",
            Self::Production => "prod",
        }
    }

    /// Resolve an environment tag (case-insensitive).
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "test" => Ok(Self::Test),
            "demo" => Ok(Self::Demo),
            "prod" | "production" => Ok(Self::Production),
            other => Err(Error::InvalidParameter(format!(
                "Unknown KSeF environment '{other}', expected test, demo or prod"
            ))),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::Test
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Environment {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag())
    }
}

impl<'de> Deserialize<'de> for Environment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
