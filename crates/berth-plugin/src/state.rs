//! Machine run state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider-reported state of a machine.
///
/// Decoding is strict: a stored state carrying a field this type does not
/// know about is rejected rather than silently dropped, so that
/// `decode(encode(s)) == s` holds for every value that decodes at all.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MachineState {
    /// Short machine-readable identifier (`running`, `poweroff`, ...).
    pub id: String,
    /// One-line human description.
    pub short_description: String,
    /// Longer human description.
    pub long_description: String,
}

impl MachineState {
    pub fn new(
        id: impl Into<String>,
        short_description: impl Into<String>,
        long_description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            short_description: short_description.into(),
            long_description: long_description.into(),
        }
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id.is_empty() {
            write!(f, "unknown")
        } else {
            write!(f, "{}", self.id)
        }
    }
}
