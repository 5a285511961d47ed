//! Shared fakes for berth-core integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use berth_core::{
    BoxAcquisition, BoxCatalog, CoreConfig, DurableStore, MemoryBoxCatalog,
    MemoryComponentSource, MemoryStore, ParentChainRanker, Project, ProjectServices, StoreError,
};
use berth_plugin::{
    BoxReference, CapabilityKind, Component, Detect, Guest, MachineId, ProjectInfo, SeedContext,
    Seeder, SyncedFolder, SyncedFolderSpec, TargetDescriptor,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Guest that detects when a platform hint has a given value.
pub struct HintGuest {
    key: &'static str,
    value: &'static str,
    fail_seed: bool,
    delay: Duration,
    probes: Arc<AtomicUsize>,
    seeds: Arc<Mutex<Vec<SeedContext>>>,
}

#[async_trait]
impl Detect for HintGuest {
    async fn detect(&self, target: &TargetDescriptor) -> anyhow::Result<bool> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(target.hint(self.key) == Some(self.value))
    }

    fn as_seeder(&self) -> Option<&dyn Seeder> {
        Some(self)
    }
}

#[async_trait]
impl Seeder for HintGuest {
    async fn seed(&self, context: SeedContext) -> anyhow::Result<()> {
        if self.fail_seed {
            anyhow::bail!("guest refused seed");
        }
        self.seeds.lock().unwrap().push(context);
        Ok(())
    }
}

impl Guest for HintGuest {}

/// Guest whose probe always errors.
pub struct BrokenGuest;

#[async_trait]
impl Detect for BrokenGuest {
    async fn detect(&self, _target: &TargetDescriptor) -> anyhow::Result<bool> {
        anyhow::bail!("plugin crashed")
    }
}

impl Guest for BrokenGuest {}

/// Transport that records which folders it was asked to enable.
#[derive(Default)]
pub struct RecordingFolder {
    pub enabled: Mutex<Vec<SyncedFolderSpec>>,
}

#[async_trait]
impl SyncedFolder for RecordingFolder {
    async fn enable(
        &self,
        _target: &TargetDescriptor,
        folders: &[SyncedFolderSpec],
    ) -> anyhow::Result<()> {
        self.enabled.lock().unwrap().extend_from_slice(folders);
        Ok(())
    }
}

/// Memory store that can be told to fail, and checks that saves for one
/// machine never overlap.
#[derive(Default)]
pub struct TestStore {
    inner: MemoryStore,
    pub fail: AtomicBool,
    pub saves: AtomicUsize,
    pub save_delay_ms: AtomicUsize,
    in_flight: AtomicUsize,
    pub overlapped: AtomicBool,
}

#[async_trait]
impl DurableStore for TestStore {
    async fn save(&self, id: MachineId, record: Vec<u8>) -> Result<(), StoreError> {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlapped.store(true, Ordering::SeqCst);
        }

        let delay = self.save_delay_ms.load(Ordering::SeqCst) as u64;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let result = if self.fail.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("injected failure".into()))
        } else {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.inner.save(id, record).await
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn load(&self, id: MachineId) -> Result<Option<Vec<u8>>, StoreError> {
        self.inner.load(id).await
    }
}

/// Acquisition that counts calls and registers into a memory catalog.
pub struct CountingAcquisition {
    pub catalog: Arc<MemoryBoxCatalog>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl BoxAcquisition for CountingAcquisition {
    async fn ensure_box(
        &self,
        name: &str,
        provider: &str,
        host: &ProjectInfo,
    ) -> anyhow::Result<BoxReference> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.catalog.ensure_box(name, provider, host).await
    }
}

/// A fully wired project plus handles on its fakes.
pub struct Harness {
    pub project: Arc<Project>,
    pub store: Arc<TestStore>,
    pub catalog: Arc<MemoryBoxCatalog>,
    pub acquisition: Arc<CountingAcquisition>,
    pub probes: Arc<AtomicUsize>,
    pub seeds: Arc<Mutex<Vec<SeedContext>>>,
}

pub struct HarnessBuilder {
    source: MemoryComponentSource,
    ranker: ParentChainRanker,
    config: CoreConfig,
    boxes: Vec<BoxReference>,
    store: Arc<TestStore>,
    probes: Arc<AtomicUsize>,
    seeds: Arc<Mutex<Vec<SeedContext>>>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        init_tracing();
        Self {
            source: MemoryComponentSource::new(),
            ranker: ParentChainRanker::new(),
            config: CoreConfig::default(),
            boxes: Vec::new(),
            store: Arc::new(TestStore::default()),
            probes: Arc::new(AtomicUsize::new(0)),
            seeds: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a guest detecting on `key == value`, optionally under a parent.
    pub fn guest(
        mut self,
        name: &str,
        key: &'static str,
        value: &'static str,
        parent: Option<&str>,
    ) -> Self {
        let factory = self.guest_factory(key, value, false, Duration::ZERO);
        self.source = self.source.register(name, factory);
        if let Some(parent) = parent {
            self.ranker = self.ranker.with_parent(CapabilityKind::Guest, name, parent);
        }
        self
    }

    /// Register a guest that detects on `key == value` but fails seeding.
    pub fn unseedable_guest(mut self, name: &str, key: &'static str, value: &'static str) -> Self {
        let factory = self.guest_factory(key, value, true, Duration::ZERO);
        self.source = self.source.register(name, factory);
        self
    }

    /// Register a guest whose detection takes `delay` before answering.
    pub fn slow_guest(
        mut self,
        name: &str,
        key: &'static str,
        value: &'static str,
        delay: Duration,
    ) -> Self {
        let factory = self.guest_factory(key, value, false, delay);
        self.source = self.source.register(name, factory);
        self
    }

    pub fn broken_guest(mut self, name: &str) -> Self {
        self.source = self
            .source
            .register(name, || Component::Guest(Arc::new(BrokenGuest)));
        self
    }

    pub fn folder(mut self, name: &str) -> Self {
        self.source = self.source.register(name, || {
            Component::SyncedFolder(Arc::new(RecordingFolder::default()))
        });
        self
    }

    pub fn known_box(mut self, reference: BoxReference) -> Self {
        self.boxes.push(reference);
        self
    }

    pub fn config(mut self, config: CoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(mut self, store: Arc<TestStore>) -> Self {
        self.store = store;
        self
    }

    fn guest_factory(
        &self,
        key: &'static str,
        value: &'static str,
        fail_seed: bool,
        delay: Duration,
    ) -> impl Fn() -> Component + Send + Sync + 'static {
        let probes = Arc::clone(&self.probes);
        let seeds = Arc::clone(&self.seeds);
        move || {
            Component::Guest(Arc::new(HintGuest {
                key,
                value,
                fail_seed,
                delay,
                probes: Arc::clone(&probes),
                seeds: Arc::clone(&seeds),
            }))
        }
    }

    pub fn build(self) -> Harness {
        let catalog = Arc::new(MemoryBoxCatalog::with_boxes(self.boxes));
        let acquisition = Arc::new(CountingAcquisition {
            catalog: Arc::clone(&catalog),
            calls: AtomicUsize::new(0),
        });

        let catalog_dyn: Arc<dyn BoxCatalog> = catalog.clone();
        let services = ProjectServices {
            components: Arc::new(self.source),
            ranker: Arc::new(self.ranker),
            store: self.store.clone(),
            catalog: catalog_dyn,
            acquisition: acquisition.clone(),
        };

        let project = Project::new(
            ProjectInfo::new("test-project", "/tmp/test-project"),
            self.config,
            services,
        )
        .expect("project should build");

        Harness {
            project,
            store: self.store,
            catalog,
            acquisition,
            probes: self.probes,
            seeds: self.seeds,
        }
    }
}
