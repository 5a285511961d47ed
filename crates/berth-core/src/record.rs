//! The durable machine record.

use crate::error::{CoreError, Result};
use berth_plugin::{BoxReference, MachineId, MachineState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything about a machine that survives a restart.
///
/// `state` is kept as structured data rather than a typed value so that a
/// record written by a newer schema is rejected on decode instead of being
/// silently truncated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineRecord {
    pub resource_id: MachineId,
    pub name: String,
    /// Provider-assigned machine ID. Empty until set.
    #[serde(default)]
    pub id: String,
    /// ID of the user that owns the machine.
    #[serde(default)]
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<serde_json::Value>,
    #[serde(rename = "box", default, skip_serializing_if = "Option::is_none")]
    pub box_ref: Option<BoxReference>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl MachineRecord {
    pub fn new(resource_id: MachineId, name: impl Into<String>) -> Self {
        Self {
            resource_id,
            name: name.into(),
            id: String::new(),
            uid: String::new(),
            state: None,
            box_ref: None,
            updated_at: None,
        }
    }

    /// Decode the state sub-structure. A record with no state decodes to the
    /// default (unknown) state.
    pub fn decode_state(&self) -> Result<MachineState> {
        match &self.state {
            Some(value) => serde_json::from_value(value.clone()).map_err(CoreError::StateDecode),
            None => Ok(MachineState::default()),
        }
    }

    /// Encode `state` into the state sub-structure.
    pub fn encode_state(&mut self, state: &MachineState) -> Result<()> {
        self.state = Some(serde_json::to_value(state).map_err(CoreError::StateEncode)?);
        Ok(())
    }

    /// Serialize into the opaque form handed to the durable store.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(CoreError::Record)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(CoreError::Record)
    }
}
