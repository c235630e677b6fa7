//! File-backed pending-match slot.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::PendingSlot;
use crate::types::PendingMatch;

/// Durable pending-match slot backed by one pretty-printed JSON file
/// under the data directory. Plays the role browser storage plays for
/// a web client: the snapshot survives restarts until it is flushed or
/// overwritten.
pub struct JsonFileSlot {
    storage_path: PathBuf,
}

impl JsonFileSlot {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            storage_path: data_dir.join("pending_match.json"),
        }
    }
}

#[async_trait]
impl PendingSlot for JsonFileSlot {
    async fn read(&self) -> Result<Option<PendingMatch>> {
        if !self.storage_path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.storage_path)
            .with_context(|| format!("Failed to read {}", self.storage_path.display()))?;
        match serde_json::from_str(&content) {
            Ok(pending) => Ok(Some(pending)),
            Err(e) => {
                // A corrupt slot must not wedge sign-in.
                tracing::warn!(error = %e, "pending-match slot is corrupt, treating as empty");
                Ok(None)
            }
        }
    }

    async fn write(&self, pending: &PendingMatch) -> Result<()> {
        let content = serde_json::to_string_pretty(pending)
            .context("Failed to serialize pending match")?;
        if let Some(parent) = self.storage_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&self.storage_path, content)
            .with_context(|| format!("Failed to write {}", self.storage_path.display()))?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        if self.storage_path.exists() {
            fs::remove_file(&self.storage_path)
                .with_context(|| format!("Failed to remove {}", self.storage_path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CompanyId;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("capguess-slot-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn slot_round_trips_through_the_filesystem() {
        let dir = temp_dir();
        let slot = JsonFileSlot::new(&dir);
        assert_eq!(slot.read().await.unwrap(), None);

        let pending = PendingMatch {
            subject_id: CompanyId(42),
            guess: 1.2e12,
            actual_value: 1.1e12,
        };
        slot.write(&pending).await.unwrap();

        // A second slot on the same path sees the value, like a page
        // reload would.
        let reopened = JsonFileSlot::new(&dir);
        assert_eq!(reopened.read().await.unwrap(), Some(pending));

        slot.clear().await.unwrap();
        assert_eq!(slot.read().await.unwrap(), None);
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn corrupt_slot_reads_as_empty() {
        let dir = temp_dir();
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("pending_match.json"), "{not json").unwrap();

        let slot = JsonFileSlot::new(&dir);
        assert_eq!(slot.read().await.unwrap(), None);
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn write_creates_the_data_directory() {
        let dir = temp_dir().join("nested");
        let slot = JsonFileSlot::new(&dir);
        let pending = PendingMatch {
            subject_id: CompanyId(1),
            guess: 5e11,
            actual_value: 4e11,
        };
        slot.write(&pending).await.unwrap();
        assert!(dir.join("pending_match.json").exists());
        let _ = fs::remove_dir_all(dir.parent().unwrap());
    }
}
