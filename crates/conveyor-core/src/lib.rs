//! Core domain types for the Conveyor pipeline metadata store.
//!
//! This crate contains:
//! - Entity identifiers and common types
//! - Resource version blobs, metadata and versioned-resource records
//! - Build statuses and build inputs
//! - Pagination cursors for version history
//! - Input mappings produced by the external resolver
//! - The version-graph snapshot handed to the resolver

pub mod build;
pub mod config;
pub mod graph;
pub mod id;
pub mod mapping;
pub mod page;
pub mod version;

pub use build::{BuildInput, BuildStatus, ParseBuildStatusError};
pub use config::{GroupConfig, JobConfig, PipelineConfig, ResourceConfig};
pub use graph::{BuildInputEntry, BuildOutputEntry, ResourceVersionEntry, VersionsGraph};
pub use id::EntityId;
pub use mapping::{InputMapping, InputVersion};
pub use page::{Page, Pagination};
pub use version::{MetadataField, SavedVersionedResource, Version, VersionedResource};
