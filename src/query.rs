//! Filter evaluation over index snapshots
//!
//! Queries never traverse the index themselves: they take a snapshot and
//! filter it, so evaluation never contends with the indexing task beyond the
//! snapshot copy.

use serde::{Deserialize, Serialize};

use crate::index::{IndexReader, IndexedRecord};
use crate::record::Provenance;

/// Filter over a small fixed set of entity attributes.
///
/// Every attribute that is set must match. An unset or empty attribute
/// matches every record, including records whose entity is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Query {
    /// Entity label equality, case-insensitive
    pub label: Option<String>,
    /// Entity label substring, case-insensitive
    pub label_contains: Option<String>,
    /// Entity type equality, case-insensitive
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
    /// Entity data hash, exact
    pub data_hash: Option<String>,
}

impl Query {
    /// Query matching every record
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    /// True when no attribute constrains the result
    pub fn is_unfiltered(&self) -> bool {
        [
            &self.label,
            &self.label_contains,
            &self.entity_type,
            &self.data_hash,
        ]
        .iter()
        .all(|value| active(value).is_none())
    }

    pub fn matches(&self, record: &Provenance) -> bool {
        if self.is_unfiltered() {
            return true;
        }
        let Some(entity) = record.entity.as_ref() else {
            return false;
        };

        let label = entity.label.as_deref();
        check(active(&self.label), label, eq_ignore_case)
            && check(active(&self.label_contains), label, contains_ignore_case)
            && check(
                active(&self.entity_type),
                entity.entity_type.as_deref(),
                eq_ignore_case,
            )
            && check(active(&self.data_hash), entity.data_hash.as_deref(), |a, b| {
                a == b
            })
    }
}

/// Response carried back to a query client
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub data: Vec<IndexedRecord>,
}

/// Query evaluator bound to a read-only index view
#[derive(Clone)]
pub struct QueryEngine {
    reader: IndexReader,
}

impl QueryEngine {
    pub fn new(reader: IndexReader) -> Self {
        Self { reader }
    }

    /// Snapshot the index and filter it
    pub fn execute(&self, query: &Query) -> QueryResponse {
        let data = Self::filter(self.reader.snapshot_all(), query);
        tracing::debug!("Query {:?} matched {} records", query, data.len());
        QueryResponse { data }
    }

    /// Keep the records matching `query`, preserving input order
    pub fn filter<I>(records: I, query: &Query) -> Vec<IndexedRecord>
    where
        I: IntoIterator<Item = IndexedRecord>,
    {
        records
            .into_iter()
            .filter(|indexed| query.matches(&indexed.record))
            .collect()
    }
}

fn active(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// An inactive filter always passes; an active one fails on a missing field
fn check(
    wanted: Option<&str>,
    actual: Option<&str>,
    compare: impl Fn(&str, &str) -> bool,
) -> bool {
    match (wanted, actual) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(wanted), Some(actual)) => compare(actual, wanted),
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
