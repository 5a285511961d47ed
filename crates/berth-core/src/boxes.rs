//! Box lookup and acquisition collaborators.

use async_trait::async_trait;
use berth_plugin::{BoxReference, ProjectInfo};
use tokio::sync::RwLock;

/// Boxes already known to the environment.
#[async_trait]
pub trait BoxCatalog: Send + Sync {
    /// Find a box by name. `provider` narrows the match when given.
    async fn find(&self, name: &str, provider: Option<&str>) -> anyhow::Result<Option<BoxReference>>;
}

/// Brings a missing box into the environment (download, import, ...).
#[async_trait]
pub trait BoxAcquisition: Send + Sync {
    async fn ensure_box(
        &self,
        name: &str,
        provider: &str,
        host: &ProjectInfo,
    ) -> anyhow::Result<BoxReference>;
}

/// In-process box collection.
///
/// It is its own acquisition collaborator: "acquiring" a box registers a
/// reference at `initial_version`, with no download involved.
#[derive(Debug)]
pub struct MemoryBoxCatalog {
    boxes: RwLock<Vec<BoxReference>>,
    initial_version: String,
}

impl Default for MemoryBoxCatalog {
    fn default() -> Self {
        Self {
            boxes: RwLock::new(Vec::new()),
            initial_version: "0".into(),
        }
    }
}

impl MemoryBoxCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a set of known boxes.
    pub fn with_boxes(boxes: impl IntoIterator<Item = BoxReference>) -> Self {
        Self {
            boxes: RwLock::new(boxes.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Add a known box.
    pub async fn add(&self, reference: BoxReference) {
        self.boxes.write().await.push(reference);
    }

    /// All known boxes.
    pub async fn list(&self) -> Vec<BoxReference> {
        self.boxes.read().await.clone()
    }
}

#[async_trait]
impl BoxCatalog for MemoryBoxCatalog {
    async fn find(&self, name: &str, provider: Option<&str>) -> anyhow::Result<Option<BoxReference>> {
        Ok(self
            .boxes
            .read()
            .await
            .iter()
            .find(|b| b.matches(name, provider))
            .cloned())
    }
}

#[async_trait]
impl BoxAcquisition for MemoryBoxCatalog {
    async fn ensure_box(
        &self,
        name: &str,
        provider: &str,
        host: &ProjectInfo,
    ) -> anyhow::Result<BoxReference> {
        let mut boxes = self.boxes.write().await;
        if let Some(existing) = boxes.iter().find(|b| b.matches(name, Some(provider))) {
            return Ok(existing.clone());
        }

        let reference = BoxReference::new(name, provider, self.initial_version.clone());
        reference.validate()?;
        tracing::info!(
            project = %host.name,
            name = %reference.name,
            provider = %reference.provider,
            "Box added"
        );
        boxes.push(reference.clone());
        Ok(reference)
    }
}
