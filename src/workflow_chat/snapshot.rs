//! Export of collected lead parameters when a chat completes.
//!
//! A snapshot is written in two steps. `stage` writes `<id>.json.tmp` next
//! to the final file; the manager publishes it with `commit` once the chat
//! row is saved, or removes it with `discard` when the save is lost.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

/// Writes `collected_info` as pretty JSON to `<dir>/<session_id>.json`.
#[derive(Debug, Clone)]
pub struct SnapshotExporter {
    dir: PathBuf,
}

/// A snapshot written to its temporary path and not yet published.
#[derive(Debug)]
#[must_use = "a staged snapshot must be committed or discarded"]
pub struct StagedSnapshot {
    tmp: PathBuf,
    path: PathBuf,
}

impl SnapshotExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write the snapshot to a temporary file beside its final location.
    pub async fn stage(
        &self,
        session_id: &str,
        collected_info: &BTreeMap<String, String>,
    ) -> std::io::Result<StagedSnapshot> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.dir.join(format!("{session_id}.json"));
        let tmp = self.dir.join(format!("{session_id}.json.tmp"));
        let json = serde_json::to_vec_pretty(collected_info)?;
        tokio::fs::write(&tmp, json).await?;

        Ok(StagedSnapshot { tmp, path })
    }
}

impl StagedSnapshot {
    /// Where the snapshot lands once committed.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move the snapshot to its final path, replacing any earlier one.
    pub async fn commit(self) -> std::io::Result<PathBuf> {
        tokio::fs::rename(&self.tmp, &self.path).await?;
        info!(path = %self.path.display(), "Snapshot exported");
        Ok(self.path)
    }

    /// Remove the temporary file.
    pub async fn discard(self) {
        if let Err(e) = tokio::fs::remove_file(&self.tmp).await {
            warn!(path = %self.tmp.display(), error = %e, "Failed to remove staged snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn commit_publishes_json_named_after_session() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested");
        let exporter = SnapshotExporter::new(&dir);

        let mut info = BTreeMap::new();
        info.insert("Industry".to_string(), "Technology".to_string());
        info.insert("Location".to_string(), "Europe".to_string());

        let staged = exporter.stage("abc", &info).await.unwrap();
        assert_eq!(staged.path(), dir.join("abc.json"));
        assert_eq!(file_names(&dir), vec!["abc.json.tmp"]);

        let path = staged.commit().await.unwrap();
        assert_eq!(path, dir.join("abc.json"));
        assert_eq!(file_names(&dir), vec!["abc.json"]);

        let written: BTreeMap<String, String> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written, info);
    }

    #[tokio::test]
    async fn discard_leaves_nothing_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let exporter = SnapshotExporter::new(tmp.path());

        let mut info = BTreeMap::new();
        info.insert("Industry".to_string(), "Retail".to_string());
        let staged = exporter.stage("s1", &info).await.unwrap();
        staged.discard().await;

        assert!(file_names(tmp.path()).is_empty());
    }

    #[tokio::test]
    async fn commit_overwrites_previous_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let exporter = SnapshotExporter::new(tmp.path());

        let mut info = BTreeMap::new();
        info.insert("Industry".to_string(), "Finance".to_string());
        exporter.stage("s1", &info).await.unwrap().commit().await.unwrap();

        info.insert("Industry".to_string(), "Retail".to_string());
        let path = exporter.stage("s1", &info).await.unwrap().commit().await.unwrap();

        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("Retail"));
        assert!(!text.contains("Finance"));
    }
}
