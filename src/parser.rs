//! Provenance document decoding
//!
//! Turns the raw bytes of a `.prov` document into a [`Provenance`] record.
//! Decoding is purely a bytes-to-record transform: no I/O, no shared state.
//!
//! # Document layout
//!
//! ```json
//! {
//!   "entity":   { "self": { "prov:label": "...", "prov:type": "...", "provtool:datahash": "..." } },
//!   "agent":    { "<id hash>": { "person:familyName": "...", "person:givenName": "...",
//!                                "prov:label": "...", "prov:type": "..." } },
//!   "activity": { "<id hash>": { "prov:startTime": "...", "prov:endTime": "...",
//!                                "prov:label": "...", "prov:location": "...", "provtool:means": "..." } }
//! }
//! ```
//!
//! `agent` and `activity` are keyed by an opaque identifier. Only the first
//! entry in document order is used; documents are expected to carry exactly
//! one entry per map.

use serde_json::{Map, Value};

use crate::error::{IndexError, Result};
use crate::record::{Activity, Agent, Entity, Provenance};

const KEY_ENTITY: &str = "entity";
const KEY_SELF: &str = "self";
const KEY_AGENT: &str = "agent";
const KEY_ACTIVITY: &str = "activity";

const PROV_LABEL: &str = "prov:label";
const PROV_TYPE: &str = "prov:type";
const PROV_START_TIME: &str = "prov:startTime";
const PROV_END_TIME: &str = "prov:endTime";
const PROV_LOCATION: &str = "prov:location";
const PROVTOOL_DATAHASH: &str = "provtool:datahash";
const PROVTOOL_MEANS: &str = "provtool:means";
const PERSON_FAMILY_NAME: &str = "person:familyName";
const PERSON_GIVEN_NAME: &str = "person:givenName";

/// Decoder for provenance documents
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordParser;

/// Result of decoding one document
#[derive(Debug)]
pub struct Parsed {
    /// Whatever could be extracted; all-absent for undecodable content
    pub record: Provenance,
    /// Why the content could not be decoded, if it could not
    pub error: Option<IndexError>,
}

impl Parsed {
    pub fn is_decoded(&self) -> bool {
        self.error.is_none()
    }
}

impl RecordParser {
    pub fn new() -> Self {
        Self
    }

    /// Decode a document. Never fails.
    ///
    /// Empty or whitespace-only input is a valid, empty document. Content
    /// that is not a JSON object yields an all-absent record. Missing or
    /// wrong-typed fields decode to `None`.
    pub fn parse(&self, bytes: &[u8]) -> Provenance {
        self.parse_outcome(bytes).record
    }

    /// Decode a document, also reporting why undecodable content was
    /// replaced by an all-absent record
    pub fn parse_outcome(&self, bytes: &[u8]) -> Parsed {
        match decode(bytes) {
            Ok(record) => Parsed {
                record,
                error: None,
            },
            Err(e) => Parsed {
                record: Provenance::absent(),
                error: Some(e),
            },
        }
    }
}

fn decode(bytes: &[u8]) -> Result<Provenance> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Provenance::absent());
    }

    let value: Value = serde_json::from_slice(bytes).map_err(|e| IndexError::Decode {
        message: e.to_string(),
    })?;

    let root = value.as_object().ok_or_else(|| IndexError::Decode {
        message: format!("expected a JSON object, found {}", json_kind(&value)),
    })?;

    Ok(Provenance {
        entity: extract_entity(root),
        agent: first_entry(root, KEY_AGENT).map(extract_agent),
        activity: first_entry(root, KEY_ACTIVITY).map(extract_activity),
    })
}

fn extract_entity(root: &Map<String, Value>) -> Option<Entity> {
    let fields = root
        .get(KEY_ENTITY)
        .and_then(|entity| entity.get(KEY_SELF))
        .and_then(Value::as_object)?;

    Some(Entity {
        label: string_field(fields, PROV_LABEL),
        entity_type: string_field(fields, PROV_TYPE),
        data_hash: string_field(fields, PROVTOOL_DATAHASH),
    })
}

fn extract_agent(fields: &Map<String, Value>) -> Agent {
    Agent {
        family_name: string_field(fields, PERSON_FAMILY_NAME),
        given_name: string_field(fields, PERSON_GIVEN_NAME),
        label: string_field(fields, PROV_LABEL),
        agent_type: string_field(fields, PROV_TYPE),
    }
}

fn extract_activity(fields: &Map<String, Value>) -> Activity {
    Activity {
        start_time: string_field(fields, PROV_START_TIME),
        end_time: string_field(fields, PROV_END_TIME),
        label: string_field(fields, PROV_LABEL),
        location: string_field(fields, PROV_LOCATION),
        means: string_field(fields, PROVTOOL_MEANS),
    }
}

/// First entry of an identifier-keyed map, in document order
fn first_entry<'a>(root: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    root.get(key)
        .and_then(Value::as_object)
        .and_then(|entries| entries.values().next())
        .and_then(Value::as_object)
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
