//! Record collections and the aggregate application state.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Directory holding one resource file per collection in the backing store.
pub const RESOURCE_DIR: &str = "data";

/// One of the five independently stored record collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Sections,
    Links,
    OpenPoints,
    Services,
    ChangeRequests,
}

impl Collection {
    /// Every collection, in canonical document order.
    pub const ALL: [Collection; 5] = [
        Collection::Sections,
        Collection::Links,
        Collection::OpenPoints,
        Collection::Services,
        Collection::ChangeRequests,
    ];

    /// Canonical key used in every document written by this code.
    pub fn key(self) -> &'static str {
        match self {
            Collection::Sections => "sections",
            Collection::Links => "links",
            Collection::OpenPoints => "openPoints",
            Collection::Services => "services",
            Collection::ChangeRequests => "crq",
        }
    }

    /// Older key names still accepted on read.
    pub fn legacy_keys(self) -> &'static [&'static str] {
        match self {
            Collection::OpenPoints => &["op"],
            _ => &[],
        }
    }

    /// File name of the collection's resource under [`RESOURCE_DIR`].
    pub fn resource_file(self) -> &'static str {
        match self {
            Collection::Sections => "sections.json",
            Collection::Links => "linkhub-links.json",
            Collection::OpenPoints => "open-points.json",
            Collection::Services => "services.json",
            Collection::ChangeRequests => "crq.json",
        }
    }

    /// Repository-relative path of the collection's resource.
    pub fn resource_path(self) -> String {
        format!("{}/{}", RESOURCE_DIR, self.resource_file())
    }

    /// Resolve a resource file name (e.g. `crq.json`) back to its collection.
    pub fn from_resource_file(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|collection| collection.resource_file() == name)
    }

    /// Resolve a canonical or legacy key to its collection.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|collection| {
            collection.key() == key || collection.legacy_keys().contains(&key)
        })
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A uniquely identified entry. Fields other than `id` are opaque here.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Create a record holding only an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("id".to_string(), Value::String(id.into()));
        Self(fields)
    }

    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Full in-memory aggregate of every managed collection.
///
/// Always fully populated: a collection with no data is an empty vector,
/// never absent. Serializes with canonical keys only; reading goes through
/// [`crate::state::schema`] so that legacy shapes are accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppState {
    pub sections: Vec<Record>,
    pub links: Vec<Record>,
    #[serde(rename = "openPoints")]
    pub open_points: Vec<Record>,
    pub services: Vec<Record>,
    #[serde(rename = "crq")]
    pub change_requests: Vec<Record>,
}

impl AppState {
    pub fn collection(&self, collection: Collection) -> &[Record] {
        match collection {
            Collection::Sections => &self.sections,
            Collection::Links => &self.links,
            Collection::OpenPoints => &self.open_points,
            Collection::Services => &self.services,
            Collection::ChangeRequests => &self.change_requests,
        }
    }

    pub fn collection_mut(&mut self, collection: Collection) -> &mut Vec<Record> {
        match collection {
            Collection::Sections => &mut self.sections,
            Collection::Links => &mut self.links,
            Collection::OpenPoints => &mut self.open_points,
            Collection::Services => &mut self.services,
            Collection::ChangeRequests => &mut self.change_requests,
        }
    }

    pub fn set_collection(&mut self, collection: Collection, records: Vec<Record>) {
        *self.collection_mut(collection) = records;
    }

    /// Number of records across all collections.
    pub fn total_records(&self) -> usize {
        Collection::ALL
            .into_iter()
            .map(|collection| self.collection(collection).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_records() == 0
    }

    /// Per-collection record counts in canonical order.
    pub fn counts(&self) -> Vec<(Collection, usize)> {
        Collection::ALL
            .into_iter()
            .map(|collection| (collection, self.collection(collection).len()))
            .collect()
    }
}
