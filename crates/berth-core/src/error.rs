//! Error types for berth-core.

use crate::store::StoreError;
use berth_plugin::CapabilityKind;
use thiserror::Error;

/// Result type alias for berth-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur during capability resolution and machine lifecycle
/// operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No implementation of a capability kind is registered
    #[error("no {kind} plugins registered")]
    NoCandidates {
        /// Kind that was resolved
        kind: CapabilityKind,
    },

    /// Every candidate declined (or failed) detection
    #[error("failed to detect {kind} plugin for machine {machine}")]
    NoApplicableCandidate {
        /// Kind that was resolved
        kind: CapabilityKind,
        /// Name of the machine being resolved for
        machine: String,
    },

    /// The winning candidate failed to seed
    #[error("{kind} plugin {plugin} failed to seed: {source}")]
    SeedFailed {
        kind: CapabilityKind,
        plugin: String,
        #[source]
        source: anyhow::Error,
    },

    /// The winning candidate must be seeded but has no seeding interface
    #[error("{kind} plugin {plugin} does not support seeding")]
    SeedingUnsupported {
        kind: CapabilityKind,
        plugin: String,
    },

    /// A synced folder declares a transport type nobody provides
    #[error("unknown synced folder type: {0}")]
    UnknownTransportType(String),

    /// The component source failed to enumerate or look up candidates
    #[error("{kind} lookup failed: {source}")]
    CandidateLookup {
        kind: CapabilityKind,
        #[source]
        source: anyhow::Error,
    },

    /// Stored state does not map onto `MachineState`
    #[error("failed to decode machine state: {0}")]
    StateDecode(#[source] serde_json::Error),

    /// `MachineState` could not be encoded for the record
    #[error("failed to encode machine state: {0}")]
    StateEncode(#[source] serde_json::Error),

    /// The machine record could not be serialized or deserialized
    #[error("machine record error: {0}")]
    Record(#[source] serde_json::Error),

    /// The machine has no box configured
    #[error("machine {0} has no box configured")]
    NoBoxConfigured(String),

    /// Looking up a known box failed
    #[error("box lookup failed for {name}: {source}")]
    BoxLookup {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// Acquiring a missing box failed
    #[error("failed to add box {name} ({provider}): {source}")]
    BoxAcquisition {
        name: String,
        provider: String,
        #[source]
        source: anyhow::Error,
    },

    /// Resolution was cancelled by the caller
    #[error("resolution cancelled")]
    Cancelled,

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Invalid plugin-facing data (folder or box declaration)
    #[error(transparent)]
    Plugin(#[from] berth_plugin::PluginError),

    /// Durable store failure, passed through unchanged
    #[error(transparent)]
    Store(#[from] StoreError),
}
