//! Capability discovery.
//!
//! A [`ComponentSource`] is a pure lookup service: it knows which plugin
//! implementations are loaded and hands them out by kind and name. How they
//! were loaded is not its concern, and it performs no resolution.

use async_trait::async_trait;
use berth_plugin::{CapabilityKind, Component, NamedComponent};
use std::fmt;
use std::sync::Arc;

/// Read-only lookup of loaded plugin implementations.
#[async_trait]
pub trait ComponentSource: Send + Sync {
    /// All implementations of `kind`, in the source's enumeration order.
    async fn list(&self, kind: CapabilityKind) -> anyhow::Result<Vec<NamedComponent>>;

    /// The implementation of `kind` registered as `name`, if any.
    async fn get(&self, kind: CapabilityKind, name: &str) -> anyhow::Result<Option<NamedComponent>>;
}

type Factory = Arc<dyn Fn() -> Component + Send + Sync>;

struct Registration {
    name: String,
    kind: CapabilityKind,
    factory: Factory,
}

/// Component source backed by in-process factories.
///
/// Every lookup calls the factory again, so each caller gets its own plugin
/// instance. Enumeration order is registration order.
#[derive(Default)]
pub struct MemoryComponentSource {
    registrations: Vec<Registration>,
}

impl MemoryComponentSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin under `name`.
    ///
    /// The factory is probed once to learn the component's kind.
    pub fn register<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Component + Send + Sync + 'static,
    {
        let kind = factory().kind();
        self.registrations.push(Registration {
            name: name.into(),
            kind,
            factory: Arc::new(factory),
        });
        self
    }
}

impl fmt::Debug for MemoryComponentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.registrations
                    .iter()
                    .map(|r| format!("{}:{}", r.kind, r.name)),
            )
            .finish()
    }
}

#[async_trait]
impl ComponentSource for MemoryComponentSource {
    async fn list(&self, kind: CapabilityKind) -> anyhow::Result<Vec<NamedComponent>> {
        Ok(self
            .registrations
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| NamedComponent::new(r.name.clone(), (r.factory)()))
            .collect())
    }

    async fn get(&self, kind: CapabilityKind, name: &str) -> anyhow::Result<Option<NamedComponent>> {
        Ok(self
            .registrations
            .iter()
            .find(|r| r.kind == kind && r.name == name)
            .map(|r| NamedComponent::new(r.name.clone(), (r.factory)())))
    }
}
