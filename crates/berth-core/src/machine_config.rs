//! Declared configuration of a single machine.

use crate::error::CoreError;
use berth_plugin::SyncedFolderSpec;
use std::collections::BTreeMap;

/// What the project declares about a machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MachineConfig {
    /// Machine name within the project.
    pub name: String,
    /// Box the machine is built from.
    pub box_name: Option<String>,
    /// Pinned provider. `None` means the project default.
    pub provider: Option<String>,
    /// Declared synced folders.
    pub synced_folders: Vec<SyncedFolderSpec>,
    /// Platform hints passed to detection probes.
    pub hints: BTreeMap<String, String>,
}

impl MachineConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_box(mut self, name: impl Into<String>) -> Self {
        self.box_name = Some(name.into());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_synced_folder(mut self, folder: SyncedFolderSpec) -> Self {
        self.synced_folders.push(folder);
        self
    }

    pub fn with_hint(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.hints.insert(key.into(), value.into());
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.is_empty() {
            return Err(CoreError::Config("machine name is required".into()));
        }
        for folder in &self.synced_folders {
            folder.validate()?;
        }
        Ok(())
    }
}
