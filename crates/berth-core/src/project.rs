//! Project context: the services every machine of a project shares.

use crate::boxes::{BoxAcquisition, BoxCatalog};
use crate::config::CoreConfig;
use crate::error::Result;
use crate::machine::Machine;
use crate::machine_config::MachineConfig;
use crate::rank::SpecificityRanker;
use crate::registry::CapabilityRegistry;
use crate::resolver::ResourceResolver;
use crate::source::ComponentSource;
use crate::store::DurableStore;
use berth_plugin::{MachineId, ProjectInfo};
use std::sync::Arc;

/// External collaborators a project is wired with.
#[derive(Clone)]
pub struct ProjectServices {
    pub components: Arc<dyn ComponentSource>,
    pub ranker: Arc<dyn SpecificityRanker>,
    pub store: Arc<dyn DurableStore>,
    pub catalog: Arc<dyn BoxCatalog>,
    pub acquisition: Arc<dyn BoxAcquisition>,
}

/// The project machines belong to.
pub struct Project {
    info: ProjectInfo,
    config: CoreConfig,
    registry: Arc<CapabilityRegistry>,
    resolver: ResourceResolver,
    store: Arc<dyn DurableStore>,
}

impl Project {
    /// Wire a project from its collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` does not validate.
    pub fn new(info: ProjectInfo, config: CoreConfig, services: ProjectServices) -> Result<Arc<Self>> {
        config.validate()?;

        let registry = Arc::new(CapabilityRegistry::new(
            services.components,
            services.ranker,
            &config,
        ));
        let resolver = ResourceResolver::new(
            Arc::clone(&registry),
            services.catalog,
            services.acquisition,
            &config,
        );

        tracing::info!(
            project = %info.name,
            default_provider = %config.default_provider,
            tie_break = ?config.tie_break,
            "Project ready"
        );

        Ok(Arc::new(Self {
            info,
            config,
            registry,
            resolver,
            store: services.store,
        }))
    }

    pub fn info(&self) -> &ProjectInfo {
        &self.info
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &ResourceResolver {
        &self.resolver
    }

    pub fn store(&self) -> &Arc<dyn DurableStore> {
        &self.store
    }

    /// Create a new, not yet persisted machine.
    pub fn machine(self: &Arc<Self>, config: MachineConfig) -> Result<Machine> {
        config.validate()?;
        Ok(Machine::new(Arc::clone(self), MachineId::new(), config))
    }

    /// Open the machine stored under `resource_id`, or start a fresh record
    /// under that ID if none was saved yet.
    pub async fn open_machine(
        self: &Arc<Self>,
        resource_id: MachineId,
        config: MachineConfig,
    ) -> Result<Machine> {
        config.validate()?;
        Machine::open(Arc::clone(self), resource_id, config).await
    }
}
