//! Snapshot persistence. Blinds have no position feedback, so the last
//! committed snapshot is the only way to survive a restart without a
//! mandatory re-anchoring close.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, warn};

use crate::errors::BlindError;
use crate::machine::CoverSnapshot;

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, device_id: &str) -> Result<Option<CoverSnapshot>, BlindError>;
    async fn save(&self, device_id: &str, snapshot: &CoverSnapshot) -> Result<(), BlindError>;
}

/// One pretty-printed JSON file per device under a state directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, BlindError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|e| {
            BlindError::Store(format!("cannot create state dir {}: {e}", dir.display()))
        })?;
        Ok(Self { dir })
    }

    fn path_for(&self, device_id: &str) -> PathBuf {
        // Device ids come from configuration; keep them filename-safe anyway.
        let safe: String = device_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self, device_id: &str) -> Result<Option<CoverSnapshot>, BlindError> {
        let path = self.path_for(device_id);
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(BlindError::Store(format!(
                    "cannot read {}: {e}",
                    path.display()
                )));
            }
        };
        match serde_json::from_slice(&data) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!("Discarding unreadable snapshot {}: {e}", path.display());
                Ok(None)
            }
        }
    }

    async fn save(&self, device_id: &str, snapshot: &CoverSnapshot) -> Result<(), BlindError> {
        let path = self.path_for(device_id);
        let data = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| BlindError::Store(format!("cannot serialize snapshot: {e}")))?;
        // Write-then-rename so a crash mid-write never truncates the
        // previous snapshot.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &data).await.map_err(|e| {
            BlindError::Store(format!("cannot write {}: {e}", tmp.display()))
        })?;
        fs::rename(&tmp, &path).await.map_err(|e| {
            BlindError::Store(format!("cannot rename {}: {e}", path.display()))
        })?;
        debug!(device = %device_id, "Persisted snapshot");
        Ok(())
    }
}
