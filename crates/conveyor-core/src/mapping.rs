//! Job input mappings produced by the external input resolver.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::EntityId;

/// The version resolved for one logical input name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputVersion {
    pub version_id: EntityId,
    pub first_occurrence: bool,
}

/// Input name → resolved version, as computed by the resolver for one job.
pub type InputMapping = HashMap<String, InputVersion>;
