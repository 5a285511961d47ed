//! Error types for berth-plugin.

use thiserror::Error;

/// Result type alias for berth-plugin operations.
pub type Result<T> = std::result::Result<T, PluginError>;

/// Errors raised while validating plugin-facing data.
#[derive(Debug, Error)]
pub enum PluginError {
    /// Synced folder declaration is incomplete
    #[error("invalid synced folder: {0}")]
    InvalidFolder(String),

    /// Box reference is incomplete
    #[error("invalid box reference: {0}")]
    InvalidBox(String),
}
