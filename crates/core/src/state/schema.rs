//! Reading snapshots written by any format generation.
//!
//! Every document (local blob, combined gateway response, per-resource file)
//! is reduced to canonical collections here. Canonical keys win over legacy
//! aliases when both hold an array.

use log::{debug, warn};
use serde_json::{Map, Value};

use super::model::{AppState, Collection, Record};

/// Outcome of reading an aggregate document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecognizedState {
    pub state: AppState,
    /// Collections that were present as arrays, under any accepted key.
    pub recognized: Vec<Collection>,
    /// Collections that were only found under a legacy key.
    pub legacy_aliases: Vec<Collection>,
}

impl RecognizedState {
    pub fn is_recognized(&self) -> bool {
        !self.recognized.is_empty()
    }
}

/// Read an aggregate document. Non-object input recognizes nothing.
pub fn recognize(value: &Value) -> RecognizedState {
    let mut result = RecognizedState::default();
    let Some(object) = value.as_object() else {
        return result;
    };

    for collection in Collection::ALL {
        if let Some((records, via_legacy)) = find_collection(object, collection) {
            result.state.set_collection(collection, records);
            result.recognized.push(collection);
            if via_legacy {
                result.legacy_aliases.push(collection);
            }
        }
    }

    result
}

/// Read an aggregate document, defaulting anything unrecognized to empty.
pub fn normalize(value: &Value) -> AppState {
    recognize(value).state
}

/// Extract one collection from an object holding it under any accepted key.
pub fn extract_collection(value: &Value, collection: Collection) -> Option<Vec<Record>> {
    value
        .as_object()
        .and_then(|object| find_collection(object, collection))
        .map(|(records, _)| records)
}

/// Read a single-collection resource file.
///
/// Accepts `{ "<key>": [...] }` (canonical or legacy key) and, for files
/// produced by older exports, a bare array.
pub fn parse_resource_document(value: &Value, collection: Collection) -> Option<Vec<Record>> {
    match value {
        Value::Array(items) => Some(records_from_array(items)),
        Value::Object(_) => extract_collection(value, collection),
        _ => None,
    }
}

/// Build the resource document stored for one collection.
pub fn resource_document(collection: Collection, records: &[Record]) -> Value {
    let items = records.iter().cloned().map(Record::into_value).collect();
    let mut object = Map::new();
    object.insert(collection.key().to_string(), Value::Array(items));
    Value::Object(object)
}

/// Convert raw array items into records, dropping anything that is not an object.
pub fn records_from_array(items: &[Value]) -> Vec<Record> {
    let mut dropped = 0usize;
    let records: Vec<Record> = items
        .iter()
        .filter_map(|item| match item {
            Value::Object(fields) => Some(Record::from_fields(fields.clone())),
            _ => {
                dropped += 1;
                None
            }
        })
        .collect();

    if dropped > 0 {
        warn!("[Schema] Dropped {} non-object entries while reading records", dropped);
    }
    let missing_ids = records.iter().filter(|record| record.id().is_none()).count();
    if missing_ids > 0 {
        debug!("[Schema] {} records carry no string id", missing_ids);
    }
    records
}

fn find_collection(object: &Map<String, Value>, collection: Collection) -> Option<(Vec<Record>, bool)> {
    if let Some(Value::Array(items)) = object.get(collection.key()) {
        return Some((records_from_array(items), false));
    }
    collection.legacy_keys().iter().find_map(|key| match object.get(*key) {
        Some(Value::Array(items)) => Some((records_from_array(items), true)),
        _ => None,
    })
}
