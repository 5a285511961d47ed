//! Specificity ranking.
//!
//! When more than one candidate detects as applicable, the most specific one
//! wins. Specificity is the depth of a candidate's platform ancestry: a guest
//! `ubuntu` whose parent is `debian` whose parent is `linux` is more specific
//! than `linux` alone.

use async_trait::async_trait;
use berth_plugin::{CapabilityKind, NamedComponent};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Tie-break rank of an applicable candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Specificity(pub u32);

impl fmt::Display for Specificity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ancestry-depth collaborator used only to break ties.
#[async_trait]
pub trait SpecificityRanker: Send + Sync {
    async fn depth(&self, candidate: &NamedComponent) -> anyhow::Result<Specificity>;
}

/// Ranker driven by declared `name -> parent` links per capability kind.
///
/// A candidate with no declared parent has depth 0. Cycles in the declared
/// chain are reported as errors.
#[derive(Debug, Clone, Default)]
pub struct ParentChainRanker {
    parents: HashMap<(CapabilityKind, String), String>,
}

impl ParentChainRanker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that `name` descends from `parent`.
    pub fn with_parent(
        mut self,
        kind: CapabilityKind,
        name: impl Into<String>,
        parent: impl Into<String>,
    ) -> Self {
        self.parents.insert((kind, name.into()), parent.into());
        self
    }

    /// Count parents of `name` by walking the declared chain.
    pub fn count_parents(&self, kind: CapabilityKind, name: &str) -> anyhow::Result<u32> {
        let mut seen = HashSet::new();
        let mut current = name.to_string();
        let mut depth = 0u32;

        while let Some(parent) = self.parents.get(&(kind, current.clone())) {
            if !seen.insert(current.clone()) {
                anyhow::bail!("{kind} plugin {name} has a cyclic parent chain at {current}");
            }
            depth += 1;
            current = parent.clone();
        }

        Ok(depth)
    }
}

#[async_trait]
impl SpecificityRanker for ParentChainRanker {
    async fn depth(&self, candidate: &NamedComponent) -> anyhow::Result<Specificity> {
        self.count_parents(candidate.kind(), &candidate.name)
            .map(Specificity)
    }
}
