//! Synced folder declarations.

use crate::error::PluginError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A declared host-to-guest folder mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncedFolderSpec {
    /// Path on the host.
    pub host_path: PathBuf,
    /// Mount point in the guest.
    pub guest_path: PathBuf,
    /// Backing transport type. `None` means the configured default.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
}

impl SyncedFolderSpec {
    pub fn new(host_path: impl Into<PathBuf>, guest_path: impl Into<PathBuf>) -> Self {
        Self {
            host_path: host_path.into(),
            guest_path: guest_path.into(),
            transport: None,
        }
    }

    /// Pin the backing transport type.
    pub fn with_transport(mut self, transport: impl Into<String>) -> Self {
        self.transport = Some(transport.into());
        self
    }

    /// Transport type to use, falling back to `default` when none is declared.
    pub fn transport_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self.transport.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => default,
        }
    }

    /// Check that both ends of the mapping are set.
    pub fn validate(&self) -> Result<(), PluginError> {
        if self.host_path.as_os_str().is_empty() {
            return Err(PluginError::InvalidFolder("host_path is required".into()));
        }
        if self.guest_path.as_os_str().is_empty() {
            return Err(PluginError::InvalidFolder(format!(
                "guest_path is required for {}",
                self.host_path.display()
            )));
        }
        Ok(())
    }
}
