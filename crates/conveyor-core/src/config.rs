//! Pipeline configuration as supplied by the configuration collaborator.

use serde::{Deserialize, Serialize};

/// The static config of a resource, as known to the check subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub name: String,
    pub resource_type: String,
}

/// The static config of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
}

/// A named grouping of jobs and resources for presentation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    #[serde(default)]
    pub jobs: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
}

/// A pipeline definition. Applying it reconciles the pipeline's resource and
/// job rows and bumps the pipeline's config version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}
