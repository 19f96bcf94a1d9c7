//! Snapshot: save/load every collection to/from disk.

use crate::error::{Result, VectorDbError};
use crate::persistence::serialization::{self, CatalogSnapshot};
use std::fs;
use std::path::{Path, PathBuf};

/// Manages saving and loading database snapshots.
pub struct SnapshotManager {
    dir: PathBuf,
}

impl SnapshotManager {
    /// Create a snapshot manager for the given directory.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn snapshot_path(&self) -> PathBuf {
        self.dir.join("snapshot.bin")
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join("manifest.json")
    }

    /// Save a snapshot. The data is written to a temporary file and renamed
    /// into place so a crash never leaves a half-written snapshot.
    pub fn save(&self, snapshot: &CatalogSnapshot) -> Result<()> {
        let data = serialization::to_bincode(snapshot)?;
        let tmp = self.dir.join("snapshot.bin.tmp");
        fs::write(&tmp, &data)?;
        fs::rename(&tmp, self.snapshot_path())?;

        // Human-readable summary next to the binary snapshot
        let collections: Vec<serde_json::Value> = snapshot
            .collections
            .iter()
            .map(|c| {
                serde_json::json!({
                    "name": c.name(),
                    "rows": c.len(),
                    "dimension": c.dimension(),
                    "metric": c.metric().as_str(),
                })
            })
            .collect();
        let manifest = serde_json::json!({ "collections": collections });
        let manifest_bytes = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| VectorDbError::SerializationError(e.to_string()))?;
        fs::write(self.manifest_path(), &manifest_bytes)?;

        Ok(())
    }

    /// Load a snapshot from disk, or return None if no snapshot exists.
    pub fn load(&self) -> Result<Option<CatalogSnapshot>> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Ok(None);
        }

        let data = fs::read(&path)?;
        let snapshot: CatalogSnapshot = serialization::from_bincode(&data)?;
        Ok(Some(snapshot))
    }

    /// Check if a snapshot exists.
    pub fn exists(&self) -> bool {
        self.snapshot_path().exists()
    }
}
