//! The version-graph snapshot handed to the external input resolver.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::EntityId;

/// An enabled version of a pipeline resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceVersionEntry {
    pub version_id: EntityId,
    pub check_order: i64,
    pub resource_id: EntityId,
}

/// A version produced by a succeeded build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutputEntry {
    pub version_id: EntityId,
    pub check_order: i64,
    pub resource_id: EntityId,
    pub build_id: EntityId,
    pub job_id: EntityId,
}

/// A version consumed by a build under a logical input name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInputEntry {
    pub version_id: EntityId,
    pub check_order: i64,
    pub resource_id: EntityId,
    pub build_id: EntityId,
    pub job_id: EntityId,
    pub input_name: String,
}

/// A pipeline-scoped, read-only projection of versions, build inputs and
/// build outputs, consumed by the external input-resolution algorithm.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionsGraph {
    pub build_outputs: Vec<BuildOutputEntry>,
    pub build_inputs: Vec<BuildInputEntry>,
    pub resource_versions: Vec<ResourceVersionEntry>,
    pub job_ids: HashMap<String, EntityId>,
    pub resource_ids: HashMap<String, EntityId>,
}
