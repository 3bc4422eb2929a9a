//! Workspace domain model.
//!
//! A workspace is an isolated on-disk directory owned by exactly one
//! mission, rooted at `<workspaceRoot>/<missionId>`.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata written to `.aegis/metadata.json` on creation and tracked in
/// memory by the Workspace Store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub mission_id: Uuid,
    pub root: PathBuf,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub file_count: u64,
    pub total_bytes: u64,
}

impl Workspace {
    pub fn new(mission_id: Uuid, root: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            mission_id,
            root,
            created_at: now,
            last_accessed_at: now,
            file_count: 0,
            total_bytes: 0,
        }
    }

    pub fn touch(&mut self) {
        self.last_accessed_at = Utc::now();
    }

    pub fn is_expired(&self, ttl_ms: i64) -> bool {
        let age = Utc::now().signed_duration_since(self.last_accessed_at);
        age.num_milliseconds() > ttl_ms
    }
}

/// The `.aegis/metadata.json` payload (spec.md §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceMetadataFile {
    pub mission_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub version: u32,
}

impl WorkspaceMetadataFile {
    pub fn new(mission_id: Uuid) -> Self {
        Self {
            mission_id,
            created_at: Utc::now(),
            version: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_workspace_starts_empty_and_fresh() {
        let ws = Workspace::new(Uuid::new_v4(), PathBuf::from("/tmp/x"));
        assert_eq!(ws.file_count, 0);
        assert_eq!(ws.total_bytes, 0);
        assert!(!ws.is_expired(60_000));
    }

    #[test]
    fn expiry_is_relative_to_last_accessed_at() {
        let mut ws = Workspace::new(Uuid::new_v4(), PathBuf::from("/tmp/x"));
        ws.last_accessed_at = Utc::now() - chrono::Duration::milliseconds(1000);
        assert!(ws.is_expired(500));
        ws.touch();
        assert!(!ws.is_expired(500));
    }
}
