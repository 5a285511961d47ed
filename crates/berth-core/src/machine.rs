//! Machine entity: identity, state, box and resolved capabilities.
//!
//! # Persistence
//!
//! Every mutation goes through a single serialize-then-save path. The
//! mutation is applied to a copy of the record, the copy is persisted, and
//! only then does it replace the in-memory record. A failed save therefore
//! leaves the machine exactly as it was. The record lock is held for the
//! whole sequence, so two saves on one machine never interleave.
//!
//! # Cache slots
//!
//! The box, the guest and the synced folders are each cached in their own
//! slot. A slot is written only after its resolution fully succeeded, and
//! each slot has its own lock, so resolving the guest and the synced folders
//! concurrently never contends. Lock order is slot, then config, then record.

use crate::error::{CoreError, Result};
use crate::machine_config::MachineConfig;
use crate::project::Project;
use crate::record::MachineRecord;
use crate::registry::Resolved;
use crate::resolver::TransportHandle;
use crate::store::StoreError;
use berth_plugin::{
    BoxReference, Guest, MachineId, MachineInfo, MachineState, SeedContext, TargetDescriptor,
};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

/// A provisionable compute resource within a project.
pub struct Machine {
    resource_id: MachineId,
    project: Arc<Project>,
    config: RwLock<MachineConfig>,
    record: Mutex<MachineRecord>,
    box_slot: Mutex<Option<BoxReference>>,
    guest_slot: Mutex<Option<Resolved<dyn Guest>>>,
    folders_slot: Mutex<Option<Vec<TransportHandle>>>,
}

impl Machine {
    pub(crate) fn new(project: Arc<Project>, resource_id: MachineId, config: MachineConfig) -> Self {
        let record = MachineRecord::new(resource_id, config.name.clone());
        Self::from_record(project, config, record)
    }

    pub(crate) async fn open(
        project: Arc<Project>,
        resource_id: MachineId,
        config: MachineConfig,
    ) -> Result<Self> {
        let Some(bytes) = project.store().load(resource_id).await? else {
            tracing::debug!(machine = %resource_id, "No stored record, starting fresh");
            return Ok(Self::new(project, resource_id, config));
        };

        let mut record = MachineRecord::from_bytes(&bytes)?;
        record.resource_id = resource_id;
        record.name = config.name.clone();
        tracing::debug!(machine = %resource_id, id = %record.id, "Loaded machine record");

        Ok(Self::from_record(project, config, record))
    }

    fn from_record(project: Arc<Project>, config: MachineConfig, record: MachineRecord) -> Self {
        Self {
            resource_id: record.resource_id,
            project,
            config: RwLock::new(config),
            box_slot: Mutex::new(record.box_ref.clone()),
            record: Mutex::new(record),
            guest_slot: Mutex::new(None),
            folders_slot: Mutex::new(None),
        }
    }

    /// Durable identifier the record is stored under.
    pub fn resource_id(&self) -> MachineId {
        self.resource_id
    }

    /// The owning project.
    pub fn project(&self) -> &Arc<Project> {
        &self.project
    }

    /// Machine name within its project.
    pub async fn name(&self) -> String {
        self.config.read().await.name.clone()
    }

    /// Current declared configuration.
    pub async fn config(&self) -> MachineConfig {
        self.config.read().await.clone()
    }

    /// Provider-assigned machine ID, empty until set.
    pub async fn id(&self) -> String {
        self.record.lock().await.id.clone()
    }

    /// Assign the machine ID and save. The ID is only visible once the save
    /// succeeded.
    pub async fn set_id(&self, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        self.commit(move |record| {
            record.id = value;
            Ok(())
        })
        .await
    }

    /// ID of the owning user.
    pub async fn uid(&self) -> String {
        self.record.lock().await.uid.clone()
    }

    /// Assign the owning user and save.
    pub async fn set_uid(&self, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        self.commit(move |record| {
            record.uid = value;
            Ok(())
        })
        .await
    }

    /// Provider driving this machine.
    pub async fn provider(&self) -> String {
        self.config
            .read()
            .await
            .provider
            .clone()
            .unwrap_or_else(|| self.project.config().default_provider.clone())
    }

    /// Decode the current state from the record.
    pub async fn state(&self) -> Result<MachineState> {
        self.record.lock().await.decode_state()
    }

    /// Encode `state` into the record and save.
    pub async fn set_state(&self, state: &MachineState) -> Result<()> {
        self.commit(|record| record.encode_state(state)).await?;
        tracing::debug!(machine = %self.resource_id, state = %state, "Machine state updated");
        Ok(())
    }

    /// Persist the current record.
    pub async fn save(&self) -> Result<()> {
        self.commit(|_| Ok(())).await
    }

    /// A copy of the current record.
    pub async fn record(&self) -> MachineRecord {
        self.record.lock().await.clone()
    }

    /// The box this machine is built from, resolving and persisting it on
    /// first access.
    pub async fn box_ref(&self) -> Result<BoxReference> {
        self.box_ref_with(&CancellationToken::new()).await
    }

    /// [`box_ref`](Self::box_ref) with a caller-supplied cancellation signal.
    pub async fn box_ref_with(&self, cancel: &CancellationToken) -> Result<BoxReference> {
        let mut slot = self.box_slot.lock().await;
        if let Some(cached) = slot.as_ref() {
            return Ok(cached.clone());
        }

        let config = self.config().await;
        let name = config
            .box_name
            .clone()
            .ok_or_else(|| CoreError::NoBoxConfigured(config.name.clone()))?;

        let reference = self
            .project
            .resolver()
            .resolve_box(&name, config.provider.as_deref(), self.project.info(), cancel)
            .await?;

        let stored = reference.clone();
        self.commit(move |record| {
            record.box_ref = Some(stored);
            Ok(())
        })
        .await?;

        tracing::info!(machine = %self.resource_id, box_ref = %reference, "Box resolved");
        *slot = Some(reference.clone());
        Ok(reference)
    }

    /// The guest adapter for this machine, detected on first access.
    pub async fn guest(&self) -> Result<Resolved<dyn Guest>> {
        self.guest_with(&CancellationToken::new()).await
    }

    /// [`guest`](Self::guest) with a caller-supplied cancellation signal.
    pub async fn guest_with(&self, cancel: &CancellationToken) -> Result<Resolved<dyn Guest>> {
        let mut slot = self.guest_slot.lock().await;
        if let Some(cached) = slot.as_ref() {
            return Ok(cached.clone());
        }

        let context = self.seed_context().await;
        let resolved = self
            .project
            .registry()
            .resolve::<dyn Guest>(&context, cancel)
            .await?;

        *slot = Some(resolved.clone());
        Ok(resolved)
    }

    /// One transport per declared synced folder, resolved on first access.
    pub async fn synced_folders(&self) -> Result<Vec<TransportHandle>> {
        self.synced_folders_with(&CancellationToken::new()).await
    }

    /// [`synced_folders`](Self::synced_folders) with a caller-supplied
    /// cancellation signal.
    pub async fn synced_folders_with(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<TransportHandle>> {
        let mut slot = self.folders_slot.lock().await;
        if let Some(cached) = slot.as_ref() {
            return Ok(cached.clone());
        }

        let specs = self.config.read().await.synced_folders.clone();
        let handles = self
            .project
            .resolver()
            .resolve_synced_folders(&specs, cancel)
            .await?;

        *slot = Some(handles.clone());
        Ok(handles)
    }

    /// Forget the cached box. The next access looks it up again.
    pub async fn invalidate_box(&self) {
        *self.box_slot.lock().await = None;
    }

    /// Forget the cached guest. The next access re-runs detection.
    pub async fn invalidate_guest(&self) {
        *self.guest_slot.lock().await = None;
    }

    /// Forget the cached synced folder transports.
    pub async fn invalidate_synced_folders(&self) {
        *self.folders_slot.lock().await = None;
    }

    /// Replace the declared configuration and drop every cached resolution.
    pub async fn reconfigure(&self, config: MachineConfig) -> Result<()> {
        config.validate()?;
        *self.config.write().await = config;

        self.invalidate_box().await;
        self.invalidate_guest().await;
        self.invalidate_synced_folders().await;
        Ok(())
    }

    /// Re-read the record from the durable store, discarding in-memory
    /// changes and cached resolutions.
    pub async fn reload(&self) -> Result<()> {
        {
            // Held across the load so an in-flight box resolution or commit
            // lands before the stored record is read.
            let mut box_slot = self.box_slot.lock().await;
            let mut record = self.record.lock().await;

            let bytes = self
                .project
                .store()
                .load(self.resource_id)
                .await?
                .ok_or(StoreError::NotFound(self.resource_id))?;

            let mut stored = MachineRecord::from_bytes(&bytes)?;
            stored.resource_id = self.resource_id;
            *box_slot = stored.box_ref.clone();
            *record = stored;
        }

        self.invalidate_guest().await;
        self.invalidate_synced_folders().await;

        tracing::debug!(machine = %self.resource_id, "Machine reloaded");
        Ok(())
    }

    /// Stable human-readable description.
    pub async fn inspect(&self) -> String {
        format!("#<Machine: {} ({})>", self.name().await, self.provider().await)
    }

    /// Release cached plugin handles.
    pub async fn close(&self) -> Result<()> {
        self.invalidate_guest().await;
        self.invalidate_synced_folders().await;
        Ok(())
    }

    /// Descriptor detection probes run against.
    pub async fn target(&self) -> TargetDescriptor {
        let config = self.config.read().await;
        TargetDescriptor {
            name: config.name.clone(),
            provider: config
                .provider
                .clone()
                .unwrap_or_else(|| self.project.config().default_provider.clone()),
            box_name: config.box_name.clone(),
            hints: config.hints.clone(),
        }
    }

    async fn seed_context(&self) -> SeedContext {
        let target = self.target().await;
        let id = self.id().await;
        SeedContext {
            machine: MachineInfo {
                resource_id: self.resource_id,
                name: target.name.clone(),
                id,
            },
            project: self.project.info().clone(),
            target,
        }
    }

    /// Apply `mutate` to a copy of the record, persist the copy, then make it
    /// current.
    async fn commit<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut MachineRecord) -> Result<()>,
    {
        let mut record = self.record.lock().await;
        let mut next = record.clone();
        mutate(&mut next)?;
        next.updated_at = Some(Utc::now());

        tracing::debug!(machine = %self.resource_id, id = %next.id, "Saving machine record");
        let bytes = next.to_bytes()?;
        self.project.store().save(self.resource_id, bytes).await?;

        *record = next;
        Ok(())
    }
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("resource_id", &self.resource_id)
            .finish_non_exhaustive()
    }
}
