//! Capability registry: detect, rank, seed.
//!
//! # Resolution
//!
//! 1. Enumerate every loaded candidate of the requested kind.
//! 2. Probe all of them concurrently, each under its own timeout. A probe
//!    that errors or times out is logged and treated as "not applicable".
//! 3. Rank only the candidates that detected. The highest specificity wins;
//!    ties keep the earliest candidate in enumeration order.
//! 4. Seed the winner. A kind that requires seeding rejects a winner that
//!    cannot be seeded, and a failed seed fails the whole resolution.
//!
//! Probe results are folded into the running best candidate in enumeration
//! order after all probes have finished, so the winner does not depend on
//! which probe happened to return first.

use crate::config::{CoreConfig, TieBreak};
use crate::error::{CoreError, Result};
use crate::rank::{Specificity, SpecificityRanker};
use crate::source::ComponentSource;
use berth_plugin::{Capability, Detect, NamedComponent, SeedContext, TargetDescriptor};
use futures::future::join_all;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A candidate that won resolution for its kind.
pub struct Resolved<C: ?Sized> {
    /// Name the candidate is registered under.
    pub name: String,
    /// The seeded implementation.
    pub candidate: Arc<C>,
    /// Specificity it won with.
    pub specificity: Specificity,
}

impl<C: ?Sized> Clone for Resolved<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            candidate: Arc::clone(&self.candidate),
            specificity: self.specificity,
        }
    }
}

impl<C: ?Sized> fmt::Debug for Resolved<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved")
            .field("name", &self.name)
            .field("specificity", &self.specificity)
            .finish()
    }
}

/// Picks the single best implementation of a capability kind for a target.
pub struct CapabilityRegistry {
    source: Arc<dyn ComponentSource>,
    ranker: Arc<dyn SpecificityRanker>,
    probe_timeout: Duration,
    tie_break: TieBreak,
}

impl CapabilityRegistry {
    pub fn new(
        source: Arc<dyn ComponentSource>,
        ranker: Arc<dyn SpecificityRanker>,
        config: &CoreConfig,
    ) -> Self {
        Self {
            source,
            ranker,
            probe_timeout: config.probe_timeout,
            tie_break: config.tie_break,
        }
    }

    /// Resolve the best candidate of kind `C` for `context.target`, seeding
    /// it with `context` before returning.
    pub async fn resolve<C>(
        &self,
        context: &SeedContext,
        cancel: &CancellationToken,
    ) -> Result<Resolved<C>>
    where
        C: Capability + Detect + ?Sized,
    {
        let kind = C::KIND;
        let target = &context.target;

        let mut candidates = self.candidates::<C>(cancel).await?;
        if candidates.is_empty() {
            return Err(CoreError::NoCandidates { kind });
        }

        tracing::debug!(
            kind = %kind,
            machine = %target.name,
            candidates = candidates.len(),
            "Running detection"
        );

        let probes = candidates
            .iter()
            .map(|(named, plugin)| self.evaluate(named, plugin.as_ref(), target));
        let scores = cancellable(cancel, join_all(probes)).await?;

        let mut best: Option<(usize, Specificity)> = None;
        for (idx, score) in scores.into_iter().enumerate() {
            let Some(score) = score else {
                continue;
            };
            match best {
                Some((_, current)) if score <= current => {}
                _ => best = Some((idx, score)),
            }
        }

        let Some((idx, specificity)) = best else {
            return Err(CoreError::NoApplicableCandidate {
                kind,
                machine: target.name.clone(),
            });
        };

        let (named, candidate) = candidates.swap_remove(idx);
        tracing::info!(
            kind = %kind,
            name = %named.name,
            specificity = %specificity,
            "Detection complete"
        );

        self.seed(&named.name, candidate.as_ref(), context, cancel)
            .await?;

        Ok(Resolved {
            name: named.name,
            candidate,
            specificity,
        })
    }

    /// Look up the implementation of kind `C` registered as `name`, without
    /// detection.
    pub async fn lookup<C>(&self, name: &str, cancel: &CancellationToken) -> Result<Option<Arc<C>>>
    where
        C: Capability + ?Sized,
    {
        let kind = C::KIND;
        let found = cancellable(cancel, self.source.get(kind, name))
            .await?
            .map_err(|source| CoreError::CandidateLookup { kind, source })?;

        Ok(found.and_then(|named| C::from_component(named.component)))
    }

    /// Enumerate candidates of kind `C` in tie-break order.
    async fn candidates<C>(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<(NamedComponent, Arc<C>)>>
    where
        C: Capability + ?Sized,
    {
        let kind = C::KIND;
        let listed = cancellable(cancel, self.source.list(kind))
            .await?
            .map_err(|source| CoreError::CandidateLookup { kind, source })?;

        let mut candidates: Vec<_> = listed
            .into_iter()
            .filter_map(|named| match C::from_component(named.component.clone()) {
                Some(plugin) => Some((named, plugin)),
                None => {
                    tracing::warn!(
                        plugin = %named.name,
                        kind = %kind,
                        actual = %named.kind(),
                        "Component source returned a plugin of the wrong kind, skipping"
                    );
                    None
                }
            })
            .collect();

        if self.tie_break == TieBreak::Name {
            candidates.sort_by(|a, b| a.0.name.cmp(&b.0.name));
        }

        Ok(candidates)
    }

    /// Probe one candidate and, only if it detected, rank it.
    async fn evaluate<C>(
        &self,
        named: &NamedComponent,
        plugin: &C,
        target: &TargetDescriptor,
    ) -> Option<Specificity>
    where
        C: Detect + ?Sized,
    {
        let detected = match tokio::time::timeout(self.probe_timeout, plugin.detect(target)).await
        {
            Ok(Ok(detected)) => detected,
            Ok(Err(e)) => {
                tracing::error!(
                    plugin = %named.name,
                    kind = %named.kind(),
                    error = %e,
                    "Error on detection check"
                );
                return None;
            }
            Err(_) => {
                tracing::warn!(
                    plugin = %named.name,
                    kind = %named.kind(),
                    timeout_ms = self.probe_timeout.as_millis() as u64,
                    "Detection check timed out"
                );
                return None;
            }
        };

        if !detected {
            tracing::trace!(plugin = %named.name, kind = %named.kind(), "Not detected");
            return None;
        }

        match self.ranker.depth(named).await {
            Ok(depth) => Some(depth),
            Err(e) => {
                tracing::error!(
                    plugin = %named.name,
                    kind = %named.kind(),
                    error = %e,
                    "Failed to get parents for detected plugin"
                );
                None
            }
        }
    }

    async fn seed<C>(
        &self,
        name: &str,
        plugin: &C,
        context: &SeedContext,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        C: Capability + Detect + ?Sized,
    {
        match plugin.as_seeder() {
            Some(seeder) => {
                tracing::debug!(kind = %C::KIND, plugin = %name, "Seeding plugin");
                cancellable(cancel, seeder.seed(context.clone()))
                    .await?
                    .map_err(|source| CoreError::SeedFailed {
                        kind: C::KIND,
                        plugin: name.to_string(),
                        source,
                    })
            }
            None if C::REQUIRES_SEEDING => Err(CoreError::SeedingUnsupported {
                kind: C::KIND,
                plugin: name.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Run `fut` unless `cancel` fires first.
pub(crate) async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output> {
    tokio::select! {
        biased;

        _ = cancel.cancelled() => Err(CoreError::Cancelled),
        out = fut => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank::ParentChainRanker;
    use crate::source::MemoryComponentSource;
    use async_trait::async_trait;
    use berth_plugin::{
        CapabilityKind, Component, Guest, MachineId, MachineInfo, ProjectInfo, Seeder,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Clone, Copy)]
    enum Probe {
        Yes,
        No,
        Fail,
        Hang,
    }

    #[derive(Clone, Copy)]
    enum Seed {
        Ok,
        Fail,
        Unsupported,
    }

    struct FakeGuest {
        probe: Probe,
        seed: Seed,
        seeded: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Detect for FakeGuest {
        async fn detect(&self, _target: &TargetDescriptor) -> anyhow::Result<bool> {
            match self.probe {
                Probe::Yes => Ok(true),
                Probe::No => Ok(false),
                Probe::Fail => anyhow::bail!("probe exploded"),
                Probe::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(true)
                }
            }
        }

        fn as_seeder(&self) -> Option<&dyn Seeder> {
            match self.seed {
                Seed::Unsupported => None,
                _ => Some(self),
            }
        }
    }

    #[async_trait]
    impl Seeder for FakeGuest {
        async fn seed(&self, _context: SeedContext) -> anyhow::Result<()> {
            match self.seed {
                Seed::Fail => anyhow::bail!("no communicator"),
                _ => {
                    self.seeded.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }
        }
    }

    impl Guest for FakeGuest {}

    /// Ranker that records which candidates it was asked about.
    #[derive(Default)]
    struct RecordingRanker {
        inner: ParentChainRanker,
        asked: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SpecificityRanker for RecordingRanker {
        async fn depth(&self, candidate: &NamedComponent) -> anyhow::Result<Specificity> {
            self.asked.lock().unwrap().push(candidate.name.clone());
            self.inner.depth(candidate).await
        }
    }

    struct Fixture {
        source: MemoryComponentSource,
        ranker: ParentChainRanker,
        config: CoreConfig,
        seeded: Arc<AtomicUsize>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                source: MemoryComponentSource::new(),
                ranker: ParentChainRanker::new(),
                config: CoreConfig::default(),
                seeded: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn guest(mut self, name: &str, probe: Probe, seed: Seed) -> Self {
            let seeded = Arc::clone(&self.seeded);
            self.source = self.source.register(name, move || {
                Component::Guest(Arc::new(FakeGuest {
                    probe,
                    seed,
                    seeded: Arc::clone(&seeded),
                }))
            });
            self
        }

        fn parent(mut self, name: &str, parent: &str) -> Self {
            self.ranker = self.ranker.with_parent(CapabilityKind::Guest, name, parent);
            self
        }

        fn registry(self) -> (CapabilityRegistry, Arc<AtomicUsize>) {
            let registry = CapabilityRegistry::new(
                Arc::new(self.source),
                Arc::new(self.ranker),
                &self.config,
            );
            (registry, self.seeded)
        }
    }

    fn context() -> SeedContext {
        SeedContext {
            machine: MachineInfo {
                resource_id: MachineId::new(),
                name: "default".into(),
                id: String::new(),
            },
            project: ProjectInfo::new("project", "/tmp/project"),
            target: TargetDescriptor {
                name: "default".into(),
                provider: "virtualbox".into(),
                ..Default::default()
            },
        }
    }

    async fn resolve(registry: &CapabilityRegistry) -> Result<Resolved<dyn Guest>> {
        registry
            .resolve::<dyn Guest>(&context(), &CancellationToken::new())
            .await
    }

    #[tokio::test]
    async fn test_single_detected_wins_regardless_of_score() {
        let (registry, _) = Fixture::new()
            .guest("linux", Probe::Yes, Seed::Ok)
            .guest("ubuntu", Probe::No, Seed::Ok)
            .parent("ubuntu", "debian")
            .parent("debian", "linux")
            .registry();

        let resolved = resolve(&registry).await.unwrap();
        assert_eq!(resolved.name, "linux");
        assert_eq!(resolved.specificity, Specificity(0));
    }

    #[tokio::test]
    async fn test_most_specific_wins() {
        let (registry, _) = Fixture::new()
            .guest("linux", Probe::Yes, Seed::Ok)
            .guest("ubuntu", Probe::Yes, Seed::Ok)
            .guest("debian", Probe::Yes, Seed::Ok)
            .parent("ubuntu", "debian")
            .parent("debian", "linux")
            .registry();

        let resolved = resolve(&registry).await.unwrap();
        assert_eq!(resolved.name, "ubuntu");
        assert_eq!(resolved.specificity, Specificity(2));
    }

    #[tokio::test]
    async fn test_tie_keeps_first_in_enumeration_order() {
        let (registry, _) = Fixture::new()
            .guest("redhat", Probe::Yes, Seed::Ok)
            .guest("debian", Probe::Yes, Seed::Ok)
            .parent("redhat", "linux")
            .parent("debian", "linux")
            .registry();

        for _ in 0..10 {
            let resolved = resolve(&registry).await.unwrap();
            assert_eq!(resolved.name, "redhat");
        }
    }

    #[tokio::test]
    async fn test_tie_break_by_name() {
        let mut fixture = Fixture::new()
            .guest("redhat", Probe::Yes, Seed::Ok)
            .guest("debian", Probe::Yes, Seed::Ok);
        fixture.config.tie_break = TieBreak::Name;
        let (registry, _) = fixture.registry();

        let resolved = resolve(&registry).await.unwrap();
        assert_eq!(resolved.name, "debian");
    }

    #[tokio::test]
    async fn test_probe_error_does_not_block_other_candidates() {
        let (registry, _) = Fixture::new()
            .guest("broken", Probe::Fail, Seed::Ok)
            .guest("debian", Probe::Yes, Seed::Ok)
            .parent("debian", "linux")
            .registry();

        let resolved = resolve(&registry).await.unwrap();
        assert_eq!(resolved.name, "debian");
        assert_eq!(resolved.specificity, Specificity(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_timeout_is_treated_as_error() {
        let (registry, _) = Fixture::new()
            .guest("stuck", Probe::Hang, Seed::Ok)
            .guest("linux", Probe::Yes, Seed::Ok)
            .parent("stuck", "linux")
            .registry();

        let resolved = resolve(&registry).await.unwrap();
        assert_eq!(resolved.name, "linux");
    }

    #[tokio::test]
    async fn test_no_candidates() {
        let (registry, _) = Fixture::new().registry();
        let err = resolve(&registry).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::NoCandidates {
                kind: CapabilityKind::Guest
            }
        ));
    }

    #[tokio::test]
    async fn test_no_applicable_candidate() {
        let (registry, _) = Fixture::new()
            .guest("linux", Probe::No, Seed::Ok)
            .guest("broken", Probe::Fail, Seed::Ok)
            .registry();

        let err = resolve(&registry).await.unwrap_err();
        assert!(matches!(err, CoreError::NoApplicableCandidate { .. }));
    }

    #[tokio::test]
    async fn test_seed_failure_fails_resolution() {
        let (registry, seeded) = Fixture::new()
            .guest("linux", Probe::Yes, Seed::Fail)
            .registry();

        let err = resolve(&registry).await.unwrap_err();
        assert!(matches!(err, CoreError::SeedFailed { ref plugin, .. } if plugin == "linux"));
        assert_eq!(seeded.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_guest_without_seeder_is_rejected() {
        let (registry, _) = Fixture::new()
            .guest("linux", Probe::Yes, Seed::Unsupported)
            .registry();

        let err = resolve(&registry).await.unwrap_err();
        assert!(matches!(err, CoreError::SeedingUnsupported { .. }));
    }

    #[tokio::test]
    async fn test_winner_is_seeded_once() {
        let (registry, seeded) = Fixture::new()
            .guest("linux", Probe::Yes, Seed::Ok)
            .guest("debian", Probe::Yes, Seed::Ok)
            .parent("debian", "linux")
            .registry();

        resolve(&registry).await.unwrap();
        assert_eq!(seeded.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_only_detected_candidates_are_ranked() {
        let fixture = Fixture::new()
            .guest("linux", Probe::Yes, Seed::Ok)
            .guest("windows", Probe::No, Seed::Ok)
            .guest("broken", Probe::Fail, Seed::Ok);
        let ranker = Arc::new(RecordingRanker::default());
        let registry = CapabilityRegistry::new(
            Arc::new(fixture.source),
            ranker.clone(),
            &fixture.config,
        );

        resolve(&registry).await.unwrap();
        assert_eq!(*ranker.asked.lock().unwrap(), vec!["linux".to_string()]);
    }

    #[tokio::test]
    async fn test_cancelled_resolution() {
        let (registry, seeded) = Fixture::new()
            .guest("linux", Probe::Yes, Seed::Ok)
            .registry();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = registry
            .resolve::<dyn Guest>(&context(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Cancelled));
        assert_eq!(seeded.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_aborts_in_flight_probes() {
        let (registry, seeded) = Fixture::new()
            .guest("linux", Probe::Hang, Seed::Ok)
            .guest("bsd", Probe::Hang, Seed::Ok)
            .registry();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = registry
            .resolve::<dyn Guest>(&context(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(seeded.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_lookup_by_name() {
        let (registry, _) = Fixture::new()
            .guest("linux", Probe::No, Seed::Ok)
            .registry();
        let cancel = CancellationToken::new();

        assert!(registry
            .lookup::<dyn Guest>("linux", &cancel)
            .await
            .unwrap()
            .is_some());
        assert!(registry
            .lookup::<dyn Guest>("bsd", &cancel)
            .await
            .unwrap()
            .is_none());
    }

    struct FailingSource;

    #[async_trait]
    impl ComponentSource for FailingSource {
        async fn list(&self, _kind: CapabilityKind) -> anyhow::Result<Vec<NamedComponent>> {
            anyhow::bail!("plugin host unreachable")
        }

        async fn get(
            &self,
            _kind: CapabilityKind,
            _name: &str,
        ) -> anyhow::Result<Option<NamedComponent>> {
            anyhow::bail!("plugin host unreachable")
        }
    }

    #[tokio::test]
    async fn test_source_failure_is_a_lookup_error() {
        let registry = CapabilityRegistry::new(
            Arc::new(FailingSource),
            Arc::new(ParentChainRanker::new()),
            &CoreConfig::default(),
        );

        let err = resolve(&registry).await.unwrap_err();
        assert!(matches!(err, CoreError::CandidateLookup { .. }));
    }
}
