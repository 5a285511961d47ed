//! Resolution configuration.
//!
//! Configuration can be built in code through [`CoreConfig::builder`] or
//! loaded from environment variables with [`CoreConfig::from_env`].

use crate::error::CoreError;
use std::path::PathBuf;
use std::time::Duration;

/// How ties between equally specific candidates are broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// Keep the first candidate in the order the component source returned
    /// them. Deterministic only if the source's order is.
    #[default]
    EnumerationOrder,
    /// Sort candidates by registered name before probing.
    Name,
}

impl TieBreak {
    /// Parse a known policy name (case-insensitive).
    pub fn try_parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "name" | "sorted" => Some(Self::Name),
            "enumeration" | "enumeration_order" => Some(Self::EnumerationOrder),
            _ => None,
        }
    }

    /// Parse from string, falling back to the default for unknown values.
    pub fn parse(s: &str) -> Self {
        Self::try_parse(s).unwrap_or_else(|| {
            tracing::warn!(value = %s, "Unrecognized tie-break policy, using enumeration order");
            Self::default()
        })
    }
}

/// Configuration shared by every machine of a project.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Provider used when a machine does not pin one (default: `virtualbox`).
    pub default_provider: String,
    /// Transport used when a synced folder declares no type
    /// (default: `virtualbox`).
    pub default_synced_folder_type: String,
    /// Upper bound on a single candidate's detection probe (default: 5s).
    pub probe_timeout: Duration,
    /// Tie-break policy among equally specific candidates.
    pub tie_break: TieBreak,
    /// Directory [`FileStore::from_config`](crate::FileStore::from_config) keeps records in.
    pub state_dir: PathBuf,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            default_provider: "virtualbox".into(),
            default_synced_folder_type: "virtualbox".into(),
            probe_timeout: Duration::from_secs(5),
            tie_break: TieBreak::EnumerationOrder,
            state_dir: PathBuf::from("/var/lib/berth/machines"),
        }
    }
}

impl CoreConfig {
    /// Create a new config builder.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `BERTH_DEFAULT_PROVIDER` | `virtualbox` |
    /// | `BERTH_DEFAULT_SYNCED_FOLDER_TYPE` | `virtualbox` |
    /// | `BERTH_PROBE_TIMEOUT_MS` | `5000` |
    /// | `BERTH_TIE_BREAK` | `enumeration` (enumeration, name) |
    /// | `BERTH_STATE_DIR` | `/var/lib/berth/machines` |
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            default_provider: std::env::var("BERTH_DEFAULT_PROVIDER")
                .unwrap_or(default.default_provider),
            default_synced_folder_type: std::env::var("BERTH_DEFAULT_SYNCED_FOLDER_TYPE")
                .unwrap_or(default.default_synced_folder_type),
            probe_timeout: std::env::var("BERTH_PROBE_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(default.probe_timeout),
            tie_break: std::env::var("BERTH_TIE_BREAK")
                .map(|v| TieBreak::parse(&v))
                .unwrap_or(default.tie_break),
            state_dir: std::env::var("BERTH_STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.state_dir),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.default_provider.is_empty() {
            return Err(CoreError::Config("default_provider must not be empty".into()));
        }
        if self.default_synced_folder_type.is_empty() {
            return Err(CoreError::Config(
                "default_synced_folder_type must not be empty".into(),
            ));
        }
        if self.probe_timeout.is_zero() {
            return Err(CoreError::Config("probe_timeout must be > 0".into()));
        }
        Ok(())
    }
}

/// Builder for CoreConfig.
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    config: CoreConfig,
}

impl CoreConfigBuilder {
    /// Set the fallback provider.
    pub fn default_provider(mut self, provider: impl Into<String>) -> Self {
        self.config.default_provider = provider.into();
        self
    }

    /// Set the fallback synced folder transport.
    pub fn default_synced_folder_type(mut self, transport: impl Into<String>) -> Self {
        self.config.default_synced_folder_type = transport.into();
        self
    }

    /// Set the per-candidate probe timeout.
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.config.probe_timeout = timeout;
        self
    }

    /// Set the tie-break policy.
    pub fn tie_break(mut self, tie_break: TieBreak) -> Self {
        self.config.tie_break = tie_break;
        self
    }

    /// Set the file store directory.
    pub fn state_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.state_dir = path.into();
        self
    }

    /// Build the configuration, validating all fields.
    pub fn build(self) -> Result<CoreConfig, CoreError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
