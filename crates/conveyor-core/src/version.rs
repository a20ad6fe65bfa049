//! Resource version blobs, metadata and versioned-resource records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::EntityId;

/// A version blob discovered by a resource check: a set of name/value pairs
/// such as `{"ref": "abc123"}`.
///
/// Keys are kept sorted so the JSON rendering is canonical; the store
/// compares rendered text directly for by-value lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(BTreeMap<String, String>);

impl Version {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style field insertion.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The canonical JSON rendering stored in the `version` column.
    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl FromIterator<(String, String)> for Version {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One ordered metadata field attached to a discovered version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataField {
    pub name: String,
    pub value: String,
}

/// A `(resource, type, version)` tuple as reported by a check or asserted by
/// a build step, before the store has assigned it an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedResource {
    /// Resource name within the pipeline.
    pub resource: String,
    /// Resource type (e.g. "git").
    pub resource_type: String,
    /// The discovered version blob.
    pub version: Version,
    /// Ordered metadata fields, replaced wholesale on re-discovery.
    pub metadata: Vec<MetadataField>,
}

/// A versioned resource as persisted, with store-assigned bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedVersionedResource {
    pub id: EntityId,
    /// Disabled versions are excluded from resolution.
    pub enabled: bool,
    /// Moves when metadata or enabled-state changes; drives snapshot-cache
    /// invalidation.
    pub modified_time: DateTime<Utc>,
    /// Discovery-recency rank within the `(resource, type)` group.
    pub check_order: i64,
    #[serde(flatten)]
    pub versioned_resource: VersionedResource,
}
