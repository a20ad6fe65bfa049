//! Build statuses and build inputs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::version::VersionedResource;

/// Status of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    /// Waiting to start.
    Pending,
    /// Currently running.
    Started,
    /// Completed successfully.
    Succeeded,
    /// One or more steps failed.
    Failed,
    /// Infrastructure or configuration error.
    Errored,
    /// Aborted by a user.
    Aborted,
}

impl BuildStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BuildStatus::Pending | BuildStatus::Started)
    }

    /// The TEXT value stored in the `builds.status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::Pending => "pending",
            BuildStatus::Started => "started",
            BuildStatus::Succeeded => "succeeded",
            BuildStatus::Failed => "failed",
            BuildStatus::Errored => "errored",
            BuildStatus::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status string that does not name a known build status.
#[derive(Debug, Error)]
#[error("unrecognized build status '{0}'")]
pub struct ParseBuildStatusError(pub String);

impl std::str::FromStr for BuildStatus {
    type Err = ParseBuildStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BuildStatus::Pending),
            "started" => Ok(BuildStatus::Started),
            "succeeded" => Ok(BuildStatus::Succeeded),
            "failed" => Ok(BuildStatus::Failed),
            "errored" => Ok(BuildStatus::Errored),
            "aborted" => Ok(BuildStatus::Aborted),
            other => Err(ParseBuildStatusError(other.to_string())),
        }
    }
}

impl TryFrom<String> for BuildStatus {
    type Error = ParseBuildStatusError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A version consumed by a build under a logical input name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInput {
    /// Logical input name from the job config.
    pub name: String,
    pub versioned_resource: VersionedResource,
    /// True if this is the first build to consume this exact version under
    /// this input name.
    pub first_occurrence: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_column_text() {
        for status in [
            BuildStatus::Pending,
            BuildStatus::Started,
            BuildStatus::Succeeded,
            BuildStatus::Failed,
            BuildStatus::Errored,
            BuildStatus::Aborted,
        ] {
            assert_eq!(status.as_str().parse::<BuildStatus>().unwrap(), status);
        }
        assert!("running".parse::<BuildStatus>().is_err());
    }

    #[test]
    fn terminal_set_excludes_pending_and_started() {
        assert!(!BuildStatus::Pending.is_terminal());
        assert!(!BuildStatus::Started.is_terminal());
        assert!(BuildStatus::Succeeded.is_terminal());
        assert!(BuildStatus::Failed.is_terminal());
        assert!(BuildStatus::Errored.is_terminal());
        assert!(BuildStatus::Aborted.is_terminal());
    }
}
