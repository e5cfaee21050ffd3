//! Persistence of the selected printer.
//!
//! The selection is a tiny JSON document in the data directory so it
//! survives service restarts and reboots.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use crate::config::SELECTION_FILE_NAME;

#[derive(Debug, Serialize, Deserialize)]
struct Selection {
    printer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SelectionStore {
    path: PathBuf,
}

impl SelectionStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(SELECTION_FILE_NAME),
        }
    }

    #[cfg(test)]
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the selected printer. A corrupt file counts as no selection.
    pub async fn load(&self) -> Option<String> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(error = ?e, path = %self.path.display(), "failed to read selected printer");
                return None;
            }
        };
        match serde_json::from_slice::<Selection>(&raw) {
            Ok(sel) => sel.printer.filter(|p| !p.is_empty()),
            Err(e) => {
                warn!(error = ?e, path = %self.path.display(), "failed to parse selected printer");
                None
            }
        }
    }

    pub async fn save(&self, printer: &str) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating data dir {}", dir.display()))?;
        }
        let body = serde_json::to_vec(&Selection {
            printer: Some(printer.to_string()),
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &body)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        info!(printer = %printer, "saved selected printer");
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                info!("cleared selected printer");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", self.path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let store = SelectionStore::new(dir.path());
        assert_eq!(store.load().await, None);
        store.save("EPSON TM-T20").await.unwrap();
        let reopened = SelectionStore::new(dir.path());
        assert_eq!(reopened.load().await.as_deref(), Some("EPSON TM-T20"));
    }

    #[tokio::test]
    async fn file_format_matches_agent_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = SelectionStore::new(dir.path());
        store.save("POS-80").await.unwrap();
        let raw = std::fs::read_to_string(dir.path().join("selected_printer.json")).unwrap();
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v, serde_json::json!({ "printer": "POS-80" }));
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("selected_printer.json"), b"{not json").unwrap();
        assert_eq!(SelectionStore::new(dir.path()).load().await, None);
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SelectionStore::new(dir.path());
        store.clear().await.unwrap();
        store.save("A").await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.load().await, None);
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn save_creates_missing_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = SelectionStore::new(&nested);
        store.save("X").await.unwrap();
        assert_eq!(store.load().await.as_deref(), Some("X"));
    }
}
