//! Version metadata for published policy snapshots.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Version metadata for the compiled policy a handle is serving.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
pub struct PolicyVersion {
    /// SHA-256 of the rule source the query was compiled from.
    pub hash: String,
    /// Bundle revision from the manifest, when the source was a bundle.
    pub revision: Option<String>,
    /// When this compiled query was published to the handle.
    pub loaded_at: String,
}

impl Display for PolicyVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.revision {
            Some(revision) => write!(f, "{} ({revision}) @ {}", self.hash, self.loaded_at),
            None => write!(f, "{} @ {}", self.hash, self.loaded_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_without_revision() {
        let version = PolicyVersion {
            hash: "abc123".to_string(),
            revision: None,
            loaded_at: "2023-01-01T00:00:00Z".to_string(),
        };
        assert_eq!(version.to_string(), "abc123 @ 2023-01-01T00:00:00Z");
    }

    #[test]
    fn test_display_with_revision() {
        let version = PolicyVersion {
            hash: "abc123".to_string(),
            revision: Some("rev-7".to_string()),
            loaded_at: "2023-01-01T00:00:00Z".to_string(),
        };
        assert!(version.to_string().contains("rev-7"));
    }

    #[test]
    fn test_serialization_round_trip() {
        let version = PolicyVersion {
            hash: "abc123".to_string(),
            revision: Some("rev-7".to_string()),
            loaded_at: "2023-01-01T00:00:00Z".to_string(),
        };
        let serialized = serde_json::to_value(&version).unwrap();
        let back: PolicyVersion = serde_json::from_value(serialized).unwrap();
        assert_eq!(version, back);
    }
}
