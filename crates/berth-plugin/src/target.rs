//! Descriptors handed to plugins during detection and seeding.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Durable identifier of a machine resource.
///
/// This is the key the machine record is stored under. It is distinct from
/// the provider-assigned machine ID, which stays empty until a provider sets
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MachineId(Uuid);

impl MachineId {
    /// Create a new random machine ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MachineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for MachineId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// The project a machine belongs to, as seen by plugins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    /// Project name.
    pub name: String,
    /// Project root directory on the host.
    pub root_path: PathBuf,
}

impl ProjectInfo {
    pub fn new(name: impl Into<String>, root_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root_path: root_path.into(),
        }
    }
}

/// Immutable view of a machine that detection probes run against.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TargetDescriptor {
    /// Machine name within its project.
    pub name: String,
    /// Provider driving the machine.
    pub provider: String,
    /// Box the machine is built from, if configured.
    pub box_name: Option<String>,
    /// Free-form platform hints (`os`, `distro`, `arch`, ...).
    pub hints: BTreeMap<String, String>,
}

impl TargetDescriptor {
    /// Look up a platform hint.
    pub fn hint(&self, key: &str) -> Option<&str> {
        self.hints.get(key).map(String::as_str)
    }
}

/// Identity of the machine a plugin is being seeded for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineInfo {
    pub resource_id: MachineId,
    pub name: String,
    /// Provider-assigned ID, empty until set.
    pub id: String,
}

/// Everything injected into a winning candidate before first use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedContext {
    pub machine: MachineInfo,
    pub project: ProjectInfo,
    pub target: TargetDescriptor,
}
