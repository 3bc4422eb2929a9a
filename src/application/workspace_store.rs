//! C1 Workspace Store (spec.md §4.1).
//!
//! Owns per-mission directories under a root path: creation with standard
//! subdirectories, path-traversal-safe read/write/list/delete, a per-file
//! byte ceiling, and periodic TTL eviction of idle workspaces and stale
//! temp files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::models::config::WorkspaceConfig;
use crate::domain::models::workspace::{Workspace, WorkspaceMetadataFile};
use crate::domain::ports::errors::AegisError;

const STANDARD_SUBDIRS: [&str; 4] = ["src", "tests", "docs", ".aegis"];

/// Options accepted by [`WorkspaceStore::write_file`].
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    pub create_parents: bool,
    pub overwrite: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { create_parents: true, overwrite: true }
    }
}

struct Inner {
    root: PathBuf,
    temp_root: PathBuf,
    max_file_bytes: u64,
    workspaces: HashMap<Uuid, Workspace>,
}

/// Thread-safe handle to the workspace registry. Cloned cheaply (an `Arc`
/// internally) and shared across the scheduling loop, the HTTP server, and
/// the TTL sweep task.
#[derive(Clone)]
pub struct WorkspaceStore {
    inner: Arc<Mutex<Inner>>,
}

impl WorkspaceStore {
    /// Creates the store and performs the startup scan over `config.root_path`
    /// (spec.md §4.1: "on init the store walks the root directory, registers
    /// pre-existing workspaces").
    pub async fn new(config: &WorkspaceConfig) -> Result<Self, AegisError> {
        let root = PathBuf::from(&config.root_path);
        let temp_root = PathBuf::from(&config.temp_path);
        fs::create_dir_all(&root).await?;
        fs::create_dir_all(&temp_root).await?;

        let mut workspaces = HashMap::new();
        let mut entries = fs::read_dir(&root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else { continue };
            let Ok(mission_id) = Uuid::parse_str(&name) else { continue };
            let (file_count, total_bytes) = dir_stats(&entry.path()).await.unwrap_or((0, 0));
            let mut ws = Workspace::new(mission_id, entry.path());
            ws.file_count = file_count;
            ws.total_bytes = total_bytes;
            info!(target: "aegis::workspace", mission_id = %mission_id, file_count, total_bytes, "registered existing workspace");
            workspaces.insert(mission_id, ws);
        }

        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                root,
                temp_root,
                max_file_bytes: config.max_file_bytes,
                workspaces,
            })),
        })
    }

    /// Idempotent: a second call for the same mission returns the existing
    /// path without touching the filesystem again.
    pub async fn create_workspace(&self, mission_id: Uuid) -> Result<PathBuf, AegisError> {
        let mut inner = self.inner.lock().await;
        if let Some(ws) = inner.workspaces.get(&mission_id) {
            return Ok(ws.root.clone());
        }

        let root = inner.root.join(mission_id.to_string());
        fs::create_dir_all(&root).await?;
        for sub in STANDARD_SUBDIRS {
            fs::create_dir_all(root.join(sub)).await?;
        }
        let metadata = WorkspaceMetadataFile::new(mission_id);
        let metadata_path = root.join(".aegis").join("metadata.json");
        fs::write(&metadata_path, serde_json::to_vec_pretty(&metadata).map_err(|e| AegisError::IoFailure(e.to_string()))?).await?;

        info!(target: "aegis::workspace", mission_id = %mission_id, root = %root.display(), "workspace created");
        inner.workspaces.insert(mission_id, Workspace::new(mission_id, root.clone()));
        Ok(root)
    }

    pub async fn workspace_path(&self, mission_id: Uuid) -> Result<PathBuf, AegisError> {
        let inner = self.inner.lock().await;
        inner
            .workspaces
            .get(&mission_id)
            .map(|ws| ws.root.clone())
            .ok_or(AegisError::WorkspaceMissing(mission_id))
    }

    pub async fn read_file(&self, mission_id: Uuid, relpath: &str, max_bytes: Option<u64>) -> Result<Vec<u8>, AegisError> {
        let abs = self.resolve(mission_id, relpath).await?;
        let bytes = fs::read(&abs).await?;
        let cap = max_bytes.unwrap_or(self.inner.lock().await.max_file_bytes);
        if bytes.len() as u64 > cap {
            return Err(AegisError::FileTooLarge(bytes.len() as u64, cap));
        }
        self.touch(mission_id).await;
        Ok(bytes)
    }

    pub async fn write_file(&self, mission_id: Uuid, relpath: &str, bytes: &[u8], opts: WriteOptions) -> Result<(), AegisError> {
        let abs = self.resolve(mission_id, relpath).await?;
        let cap = self.inner.lock().await.max_file_bytes;
        if bytes.len() as u64 > cap {
            return Err(AegisError::FileTooLarge(bytes.len() as u64, cap));
        }
        if !opts.overwrite && fs::try_exists(&abs).await.unwrap_or(false) {
            return Err(AegisError::AlreadyExists(relpath.to_string()));
        }
        if opts.create_parents {
            if let Some(parent) = abs.parent() {
                fs::create_dir_all(parent).await?;
            }
        }
        fs::write(&abs, bytes).await?;
        self.touch(mission_id).await;
        self.recompute_size(mission_id).await;
        Ok(())
    }

    pub async fn delete_file(&self, mission_id: Uuid, relpath: &str) -> Result<(), AegisError> {
        let abs = self.resolve(mission_id, relpath).await?;
        fs::remove_file(&abs).await?;
        self.touch(mission_id).await;
        self.recompute_size(mission_id).await;
        Ok(())
    }

    pub async fn list_files(&self, mission_id: Uuid, relpath: &str) -> Result<Vec<String>, AegisError> {
        let abs = self.resolve(mission_id, relpath).await?;
        let mut out = Vec::new();
        let mut entries = fs::read_dir(&abs).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                out.push(name.to_string());
            }
        }
        self.touch(mission_id).await;
        Ok(out)
    }

    pub async fn copy_file(&self, mission_id: Uuid, from: &str, to: &str) -> Result<(), AegisError> {
        let from_abs = self.resolve(mission_id, from).await?;
        let to_abs = self.resolve(mission_id, to).await?;
        if let Some(parent) = to_abs.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(&from_abs, &to_abs).await?;
        self.touch(mission_id).await;
        self.recompute_size(mission_id).await;
        Ok(())
    }

    pub async fn create_directory(&self, mission_id: Uuid, relpath: &str) -> Result<(), AegisError> {
        let abs = self.resolve(mission_id, relpath).await?;
        fs::create_dir_all(&abs).await?;
        self.touch(mission_id).await;
        Ok(())
    }

    pub async fn delete_workspace(&self, mission_id: Uuid) -> Result<(), AegisError> {
        let root = {
            let mut inner = self.inner.lock().await;
            let ws = inner.workspaces.remove(&mission_id).ok_or(AegisError::WorkspaceMissing(mission_id))?;
            ws.root
        };
        if fs::try_exists(&root).await.unwrap_or(false) {
            fs::remove_dir_all(&root).await?;
        }
        info!(target: "aegis::workspace", mission_id = %mission_id, "workspace deleted");
        Ok(())
    }

    pub async fn create_temp_file(&self, bytes: &[u8], ext: &str) -> Result<PathBuf, AegisError> {
        let inner = self.inner.lock().await;
        let name = format!("{}{}", Uuid::new_v4(), ext);
        let path = inner.temp_root.join(name);
        drop(inner);
        fs::write(&path, bytes).await?;
        Ok(path)
    }

    pub async fn delete_temp_file(&self, abs_path: &Path) -> Result<(), AegisError> {
        let inner = self.inner.lock().await;
        let normalized = normalize(abs_path);
        if !normalized.starts_with(&inner.temp_root) {
            return Err(AegisError::InvalidPath(abs_path.display().to_string()));
        }
        drop(inner);
        fs::remove_file(&normalized).await?;
        Ok(())
    }

    /// Deletes workspaces idle past `ttl_ms` and temp files older than one
    /// hour (spec.md §4.1). Intended to be driven by a periodic task.
    pub async fn sweep(&self, ttl_ms: i64) -> usize {
        let expired: Vec<Uuid> = {
            let inner = self.inner.lock().await;
            inner.workspaces.values().filter(|ws| ws.is_expired(ttl_ms)).map(|ws| ws.mission_id).collect()
        };

        for mission_id in &expired {
            if let Err(err) = self.delete_workspace(*mission_id).await {
                warn!(target: "aegis::workspace", mission_id = %mission_id, error = %err, "TTL eviction failed");
            }
        }

        let temp_root = self.inner.lock().await.temp_root.clone();
        if let Ok(mut entries) = fs::read_dir(&temp_root).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                if let Ok(metadata) = entry.metadata().await {
                    if let Ok(modified) = metadata.modified() {
                        if modified.elapsed().map(|e| e.as_secs() > 3600).unwrap_or(false) {
                            let _ = fs::remove_file(entry.path()).await;
                        }
                    }
                }
            }
        }

        expired.len()
    }

    async fn touch(&self, mission_id: Uuid) {
        if let Some(ws) = self.inner.lock().await.workspaces.get_mut(&mission_id) {
            ws.touch();
        }
    }

    async fn recompute_size(&self, mission_id: Uuid) {
        let root = {
            let inner = self.inner.lock().await;
            inner.workspaces.get(&mission_id).map(|ws| ws.root.clone())
        };
        let Some(root) = root else { return };
        if let Ok((file_count, total_bytes)) = dir_stats(&root).await {
            if let Some(ws) = self.inner.lock().await.workspaces.get_mut(&mission_id) {
                ws.file_count = file_count;
                ws.total_bytes = total_bytes;
            }
        }
    }

    /// Joins `relpath` onto the mission's root and rejects the result if its
    /// normalised form escapes the root (spec.md §4.1 / invariant §3).
    async fn resolve(&self, mission_id: Uuid, relpath: &str) -> Result<PathBuf, AegisError> {
        let root = {
            let inner = self.inner.lock().await;
            inner.workspaces.get(&mission_id).map(|ws| ws.root.clone()).ok_or(AegisError::WorkspaceMissing(mission_id))?
        };
        let joined = root.join(relpath);
        let normalized = normalize(&joined);
        if !normalized.starts_with(&root) {
            return Err(AegisError::InvalidPath(relpath.to_string()));
        }
        Ok(normalized)
    }
}

/// Lexical normalisation (no filesystem access, so it works for paths that
/// don't exist yet): resolves `.`/`..` components without touching disk.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

async fn dir_stats(root: &Path) -> std::io::Result<(u64, u64)> {
    let mut stack = vec![root.to_path_buf()];
    let mut file_count = 0u64;
    let mut total_bytes = 0u64;
    while let Some(dir) = stack.pop() {
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if metadata.is_dir() {
                stack.push(entry.path());
            } else {
                file_count += 1;
                total_bytes += metadata.len();
            }
        }
    }
    Ok((file_count, total_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(root: &Path, temp: &Path) -> WorkspaceConfig {
        WorkspaceConfig {
            root_path: root.to_string_lossy().to_string(),
            temp_path: temp.to_string_lossy().to_string(),
            ttl_ms: 60_000,
            sweep_interval_ms: 1_000,
            max_file_bytes: 16,
        }
    }

    #[tokio::test]
    async fn create_workspace_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::new(&config(root.path(), temp.path())).await.unwrap();
        let mission_id = Uuid::new_v4();

        let p1 = store.create_workspace(mission_id).await.unwrap();
        let p2 = store.create_workspace(mission_id).await.unwrap();
        assert_eq!(p1, p2);
        assert!(p1.join(".aegis/metadata.json").exists());
    }

    #[tokio::test]
    async fn write_then_read_round_trips_bytes() {
        let root = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::new(&config(root.path(), temp.path())).await.unwrap();
        let mission_id = Uuid::new_v4();
        store.create_workspace(mission_id).await.unwrap();

        store.write_file(mission_id, "src/a.txt", b"hi", WriteOptions::default()).await.unwrap();
        let bytes = store.read_file(mission_id, "src/a.txt", None).await.unwrap();
        assert_eq!(bytes, b"hi");
    }

    #[tokio::test]
    async fn path_traversal_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::new(&config(root.path(), temp.path())).await.unwrap();
        let mission_id = Uuid::new_v4();
        store.create_workspace(mission_id).await.unwrap();

        let result = store.write_file(mission_id, "../escape.txt", b"x", WriteOptions::default()).await;
        assert!(matches!(result, Err(AegisError::InvalidPath(_))));
        assert!(!root.path().join("escape.txt").exists());

        let listed = store.list_files(mission_id, "").await.unwrap();
        assert!(!listed.contains(&"escape.txt".to_string()));
    }

    #[tokio::test]
    async fn overwrite_false_rejects_existing_target() {
        let root = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::new(&config(root.path(), temp.path())).await.unwrap();
        let mission_id = Uuid::new_v4();
        store.create_workspace(mission_id).await.unwrap();

        let opts = WriteOptions { create_parents: true, overwrite: false };
        store.write_file(mission_id, "src/a.txt", b"one", opts).await.unwrap();
        let result = store.write_file(mission_id, "src/a.txt", b"two", opts).await;
        assert!(matches!(result, Err(AegisError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn file_at_cap_succeeds_cap_plus_one_fails() {
        let root = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::new(&config(root.path(), temp.path())).await.unwrap();
        let mission_id = Uuid::new_v4();
        store.create_workspace(mission_id).await.unwrap();

        let at_cap = vec![0u8; 16];
        store.write_file(mission_id, "src/cap.bin", &at_cap, WriteOptions::default()).await.unwrap();

        let over_cap = vec![0u8; 17];
        let result = store.write_file(mission_id, "src/over.bin", &over_cap, WriteOptions::default()).await;
        assert!(matches!(result, Err(AegisError::FileTooLarge(17, 16))));
    }

    #[tokio::test]
    async fn delete_workspace_removes_directory_and_registry_entry() {
        let root = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::new(&config(root.path(), temp.path())).await.unwrap();
        let mission_id = Uuid::new_v4();
        let path = store.create_workspace(mission_id).await.unwrap();

        store.delete_workspace(mission_id).await.unwrap();
        assert!(!path.exists());
        assert!(matches!(store.workspace_path(mission_id).await, Err(AegisError::WorkspaceMissing(_))));
    }
}
