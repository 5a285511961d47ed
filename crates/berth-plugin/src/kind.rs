//! Capability kinds.

use std::fmt;

/// A category of pluggable behavior a machine can be driven by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CapabilityKind {
    /// Guest operating system adapter.
    Guest,
    /// Host/guest folder sharing transport.
    SyncedFolder,
}

impl CapabilityKind {
    /// Stable name used in logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guest => "Guest",
            Self::SyncedFolder => "SyncedFolder",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
