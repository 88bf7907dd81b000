//! Provenance record types
//!
//! A record is the Entity/Agent/Activity triple decoded from one `.prov`
//! document. Every field is optional: a document with an unexpected shape
//! still yields whatever values could be extracted, and a document that could
//! not be decoded at all yields a record whose three sub-records are `None`.

use serde::{Deserialize, Serialize};

/// The artifact a provenance document describes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
    /// Content hash of the described artifact
    pub data_hash: Option<String>,
}

/// The actor responsible for the activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub family_name: Option<String>,
    pub given_name: Option<String>,
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub agent_type: Option<String>,
}

/// The action that produced the entity
///
/// Timestamps are kept as the ISO-8601 text found in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub label: Option<String>,
    pub location: Option<String>,
    pub means: Option<String>,
}

/// One decoded provenance document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Provenance {
    pub entity: Option<Entity>,
    pub agent: Option<Agent>,
    pub activity: Option<Activity>,
}

impl Provenance {
    /// Record with all three sub-records absent
    pub fn absent() -> Self {
        Self::default()
    }

    /// True when nothing could be extracted from the source document
    pub fn is_absent(&self) -> bool {
        self.entity.is_none() && self.agent.is_none() && self.activity.is_none()
    }

    /// Entity label, if both the entity and its label are present
    pub fn entity_label(&self) -> Option<&str> {
        self.entity.as_ref().and_then(|e| e.label.as_deref())
    }
}
