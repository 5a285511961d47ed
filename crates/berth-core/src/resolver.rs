//! Resource resolution: box images and synced folder transports.

use crate::boxes::{BoxAcquisition, BoxCatalog};
use crate::config::CoreConfig;
use crate::error::{CoreError, Result};
use crate::registry::{cancellable, CapabilityRegistry};
use berth_plugin::{BoxReference, ProjectInfo, SyncedFolder, SyncedFolderSpec};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A declared synced folder paired with the transport instance serving it.
#[derive(Clone)]
pub struct TransportHandle {
    /// The folder declaration.
    pub spec: SyncedFolderSpec,
    /// Transport type the folder resolved to.
    pub transport_type: String,
    /// Transport instance owned by this folder alone.
    pub transport: Arc<dyn SyncedFolder>,
}

impl fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportHandle")
            .field("spec", &self.spec)
            .field("transport_type", &self.transport_type)
            .finish()
    }
}

/// Resolves the resources a machine is built from and exposes.
///
/// Boxes are only reachable through a [`Machine`](crate::Machine), which saves
/// the resolved box before returning it:
///
/// ```compile_fail
/// # async fn unsaved(resolver: &berth_core::ResourceResolver, host: &berth_plugin::ProjectInfo) {
/// let cancel = berth_core::CancellationToken::new();
/// let _ = resolver.resolve_box("base", None, host, &cancel).await;
/// # }
/// ```
pub struct ResourceResolver {
    registry: Arc<CapabilityRegistry>,
    catalog: Arc<dyn BoxCatalog>,
    acquisition: Arc<dyn BoxAcquisition>,
    default_provider: String,
    default_synced_folder_type: String,
}

impl ResourceResolver {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        catalog: Arc<dyn BoxCatalog>,
        acquisition: Arc<dyn BoxAcquisition>,
        config: &CoreConfig,
    ) -> Self {
        Self {
            registry,
            catalog,
            acquisition,
            default_provider: config.default_provider.clone(),
            default_synced_folder_type: config.default_synced_folder_type.clone(),
        }
    }

    /// Find the box called `name`, acquiring it if nothing by that name is
    /// known.
    ///
    /// A box matching `provider` is preferred, but any box with the right name
    /// counts as known. [`Machine::box_ref`](crate::Machine::box_ref) persists
    /// the result before handing it out.
    pub(crate) async fn resolve_box(
        &self,
        name: &str,
        provider: Option<&str>,
        host: &ProjectInfo,
        cancel: &CancellationToken,
    ) -> Result<BoxReference> {
        if let Some(found) = self.find_box(name, provider, cancel).await? {
            tracing::debug!(box_name = %found.name, provider = %found.provider, "Found existing box");
            return Ok(found);
        }

        let provider = provider.unwrap_or(&self.default_provider);
        tracing::info!(box_name = %name, provider = %provider, "Box not found, adding");

        let reference = cancellable(cancel, self.acquisition.ensure_box(name, provider, host))
            .await?
            .map_err(|source| CoreError::BoxAcquisition {
                name: name.to_string(),
                provider: provider.to_string(),
                source,
            })?;
        reference.validate()?;
        Ok(reference)
    }

    async fn find_box(
        &self,
        name: &str,
        provider: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Option<BoxReference>> {
        let lookup_err = |source: anyhow::Error| CoreError::BoxLookup {
            name: name.to_string(),
            source,
        };

        let exact = cancellable(cancel, self.catalog.find(name, provider))
            .await?
            .map_err(lookup_err)?;
        if exact.is_some() || provider.is_none() {
            return Ok(exact);
        }

        cancellable(cancel, self.catalog.find(name, None))
            .await?
            .map_err(lookup_err)
    }

    /// Resolve one transport per declared folder, keyed by transport type.
    ///
    /// All-or-nothing: an unknown type aborts the whole batch.
    pub async fn resolve_synced_folders(
        &self,
        specs: &[SyncedFolderSpec],
        cancel: &CancellationToken,
    ) -> Result<Vec<TransportHandle>> {
        let mut handles = Vec::with_capacity(specs.len());

        for spec in specs {
            spec.validate()?;
            let transport_type = spec.transport_or(&self.default_synced_folder_type);

            let Some(transport) = self
                .registry
                .lookup::<dyn SyncedFolder>(transport_type, cancel)
                .await?
            else {
                tracing::error!(
                    transport_type = %transport_type,
                    guest_path = %spec.guest_path.display(),
                    "Unknown synced folder type"
                );
                return Err(CoreError::UnknownTransportType(transport_type.to_string()));
            };

            handles.push(TransportHandle {
                spec: spec.clone(),
                transport_type: transport_type.to_string(),
                transport,
            });
        }

        tracing::debug!(count = handles.len(), "Synced folders resolved");
        Ok(handles)
    }
}
