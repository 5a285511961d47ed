//! Capability traits implemented by plugins, and the typed wrapper the core
//! receives them in.

use crate::folder::SyncedFolderSpec;
use crate::kind::CapabilityKind;
use crate::target::{SeedContext, TargetDescriptor};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Self-reported applicability check.
///
/// Every capability kind resolved by detection implements this. A probe
/// error is not fatal to resolution: the core logs it and moves on to the
/// next candidate.
#[async_trait]
pub trait Detect: Send + Sync {
    /// Report whether this implementation applies to `target`.
    async fn detect(&self, target: &TargetDescriptor) -> anyhow::Result<bool>;

    /// Expose the seeding interface, if this implementation has one.
    fn as_seeder(&self) -> Option<&dyn Seeder> {
        None
    }
}

/// Post-resolution initialization.
///
/// A candidate that offers seeding is always seeded before the core hands it
/// out; a failed seed fails resolution.
#[async_trait]
pub trait Seeder: Send + Sync {
    async fn seed(&self, context: SeedContext) -> anyhow::Result<()>;
}

/// Guest operating system adapter.
pub trait Guest: Detect {}

/// Host/guest folder sharing transport, selected by declared type name.
#[async_trait]
pub trait SyncedFolder: Send + Sync {
    /// Make `folders` available inside the guest.
    async fn enable(
        &self,
        target: &TargetDescriptor,
        folders: &[SyncedFolderSpec],
    ) -> anyhow::Result<()>;
}

/// A loaded plugin implementation, tagged with its capability kind.
#[derive(Clone)]
pub enum Component {
    Guest(Arc<dyn Guest>),
    SyncedFolder(Arc<dyn SyncedFolder>),
}

impl Component {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Self::Guest(_) => CapabilityKind::Guest,
            Self::SyncedFolder(_) => CapabilityKind::SyncedFolder,
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component::{}", self.kind())
    }
}

/// A component together with the stable name it is registered under.
#[derive(Debug, Clone)]
pub struct NamedComponent {
    pub name: String,
    pub component: Component,
}

impl NamedComponent {
    pub fn new(name: impl Into<String>, component: Component) -> Self {
        Self {
            name: name.into(),
            component,
        }
    }

    pub fn kind(&self) -> CapabilityKind {
        self.component.kind()
    }
}

/// Ties a capability trait object type to its kind.
///
/// Implemented for `dyn Guest` and `dyn SyncedFolder`, so resolution code can
/// be written once and instantiated per kind.
pub trait Capability: Send + Sync {
    /// Kind this capability is registered under.
    const KIND: CapabilityKind;

    /// Whether a resolved candidate must be seeded before use.
    const REQUIRES_SEEDING: bool;

    /// Extract this capability from a component of the matching kind.
    fn from_component(component: Component) -> Option<Arc<Self>>;
}

impl Capability for dyn Guest {
    const KIND: CapabilityKind = CapabilityKind::Guest;
    const REQUIRES_SEEDING: bool = true;

    fn from_component(component: Component) -> Option<Arc<Self>> {
        match component {
            Component::Guest(guest) => Some(guest),
            _ => None,
        }
    }
}

impl Capability for dyn SyncedFolder {
    const KIND: CapabilityKind = CapabilityKind::SyncedFolder;
    const REQUIRES_SEEDING: bool = false;

    fn from_component(component: Component) -> Option<Arc<Self>> {
        match component {
            Component::SyncedFolder(folder) => Some(folder),
            _ => None,
        }
    }
}
