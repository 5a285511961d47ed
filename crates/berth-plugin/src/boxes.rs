//! Box image references.

use crate::error::PluginError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A resolved box image: what a machine is built from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoxReference {
    pub name: String,
    pub provider: String,
    pub version: String,
}

impl BoxReference {
    pub fn new(
        name: impl Into<String>,
        provider: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            version: version.into(),
        }
    }

    /// Check that name and provider are set.
    pub fn validate(&self) -> Result<(), PluginError> {
        if self.name.is_empty() {
            return Err(PluginError::InvalidBox("name is required".into()));
        }
        if self.provider.is_empty() {
            return Err(PluginError::InvalidBox(format!(
                "box {} has no provider",
                self.name
            )));
        }
        Ok(())
    }

    /// Whether this box matches a name and optional provider.
    pub fn matches(&self, name: &str, provider: Option<&str>) -> bool {
        self.name == name && provider.map_or(true, |p| self.provider == p)
    }
}

impl fmt::Display for BoxReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.provider, self.version)
    }
}
