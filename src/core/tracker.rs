use crate::core::scanner::{self, ScanError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Scan(#[from] ScanError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenameStatus {
    Success,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameRecord {
    pub new_name: String,
    pub status: RenameStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub files: BTreeMap<String, RenameRecord>,
}

/// The persisted mapping from original file names to assigned names,
/// keyed by absolute directory path. Entries accumulate across runs and
/// are only ever overwritten, never cleared.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenameLedger {
    pub directories: BTreeMap<String, DirectoryEntry>,
}

impl RenameLedger {
    /// True if `filename` was recorded under any tracked directory.
    pub fn contains(&self, filename: &str) -> bool {
        self.directories
            .values()
            .any(|entry| entry.files.contains_key(filename))
    }

    pub fn record(&mut self, directory: &str, old_name: &str, new_name: &str, status: RenameStatus) {
        self.directories.entry(directory.to_string()).or_default().files.insert(
            old_name.to_string(),
            RenameRecord {
                new_name: new_name.to_string(),
                status,
            },
        );
    }
}

/// Classifier for names produced by the renaming step.
///
/// The default implementation is a heuristic with known false positives:
/// a source file whose original name happens to contain a qualifying
/// character is classified as already renamed.
pub trait RenameDetector {
    fn is_renamed(&self, filename: &str) -> bool;
}

/// Detects renamed files by script: assigned names are written in
/// Traditional Chinese, so one CJK ideograph marks a file as named.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptDetector;

impl RenameDetector for ScriptDetector {
    fn is_renamed(&self, filename: &str) -> bool {
        contains_cjk(filename)
    }
}

/// True if `text` contains a CJK Unified Ideograph (U+4E00..U+9FFF).
pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(|c| ('\u{4e00}'..='\u{9fff}').contains(&c))
}

/// Ledger key for a target directory.
pub fn directory_key(dir: &Path) -> String {
    fs::canonicalize(dir)
        .unwrap_or_else(|_| dir.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

/// Exclusive owner of the ledger file: every mutation goes through a
/// load-mutate-save cycle on this store, never through module state.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    path: PathBuf,
}

impl LedgerStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing ledger file reads as an empty ledger.
    pub fn load(&self) -> Result<RenameLedger, TrackerError> {
        if !self.path.exists() {
            return Ok(RenameLedger::default());
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, ledger: &RenameLedger) -> Result<(), TrackerError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(ledger)?)?;
        Ok(())
    }
}

/// Decides whether files still need naming, combining the script
/// heuristic with the persisted ledger.
pub struct NameTracker<D: RenameDetector = ScriptDetector> {
    store: LedgerStore,
    detector: D,
}

impl NameTracker<ScriptDetector> {
    pub fn new(ledger_path: PathBuf) -> Self {
        Self::with_detector(ledger_path, ScriptDetector)
    }
}

impl<D: RenameDetector> NameTracker<D> {
    pub fn with_detector(ledger_path: PathBuf, detector: D) -> Self {
        Self {
            store: LedgerStore::new(ledger_path),
            detector,
        }
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    /// Heuristic first, ledger second; the first positive signal wins.
    pub fn is_renamed(&self, filename: &str) -> Result<bool, TrackerError> {
        if self.detector.is_renamed(filename) {
            return Ok(true);
        }
        Ok(self.store.load()?.contains(filename))
    }

    /// Idempotent upsert of one rename outcome.
    pub fn record(
        &self,
        dir: &Path,
        old_name: &str,
        new_name: &str,
        status: RenameStatus,
    ) -> Result<(), TrackerError> {
        let mut ledger = self.store.load()?;
        ledger.record(&directory_key(dir), old_name, new_name, status);
        self.store.save(&ledger)
    }

    /// Partition the directory's image files into (unnamed, renamed).
    /// With `force` every file is treated as unnamed and reprocessed.
    pub fn analyze(
        &self,
        dir: &Path,
        force: bool,
    ) -> Result<(Vec<String>, Vec<String>), TrackerError> {
        let images = scanner::list_images(dir, &[])?;
        let names: Vec<String> = images.iter().map(|file| file.file_name()).collect();

        if force {
            return Ok((names, Vec::new()));
        }

        let ledger = self.store.load()?;
        let mut unnamed = Vec::new();
        let mut renamed = Vec::new();
        for name in names {
            if self.detector.is_renamed(&name) || ledger.contains(&name) {
                renamed.push(name);
            } else {
                unnamed.push(name);
            }
        }
        Ok((unnamed, renamed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tracker_in(temp_dir: &TempDir) -> NameTracker {
        NameTracker::new(temp_dir.path().join("tracking").join(".renamed_tracker.json"))
    }

    #[test]
    fn test_cjk_heuristic() {
        assert!(contains_cjk("財經_投資分析_報告.png"));
        assert!(contains_cjk("mixed_圖表.png"));
        assert!(!contains_cjk("IMG_20260105_114233.jpg"));
        assert!(!contains_cjk("screenshot (3).png"));
    }

    #[test]
    fn test_record_then_is_renamed_regardless_of_heuristic() {
        let temp_dir = TempDir::new().unwrap();
        let tracker = tracker_in(&temp_dir);

        // Plain ASCII name: the heuristic alone says "not renamed".
        assert!(!tracker.is_renamed("plain_photo.png").unwrap());

        tracker
            .record(
                temp_dir.path(),
                "plain_photo.png",
                "財經_圖表.png",
                RenameStatus::Success,
            )
            .unwrap();
        assert!(tracker.is_renamed("plain_photo.png").unwrap());
    }

    #[test]
    fn test_record_is_an_upsert() {
        let temp_dir = TempDir::new().unwrap();
        let tracker = tracker_in(&temp_dir);

        tracker
            .record(temp_dir.path(), "a.png", "first.png", RenameStatus::Failed)
            .unwrap();
        tracker
            .record(temp_dir.path(), "a.png", "second.png", RenameStatus::Success)
            .unwrap();

        let ledger = tracker.store().load().unwrap();
        let entry = ledger
            .directories
            .get(&directory_key(temp_dir.path()))
            .unwrap();
        assert_eq!(entry.files.len(), 1);
        let record = entry.files.get("a.png").unwrap();
        assert_eq!(record.new_name, "second.png");
        assert_eq!(record.status, RenameStatus::Success);
    }

    #[test]
    fn test_ledger_survives_reload() {
        let temp_dir = TempDir::new().unwrap();
        let ledger_path = temp_dir.path().join(".renamed_tracker.json");

        let tracker = NameTracker::new(ledger_path.clone());
        tracker
            .record(temp_dir.path(), "a.png", "新名.png", RenameStatus::Success)
            .unwrap();

        let reopened = NameTracker::new(ledger_path);
        assert!(reopened.is_renamed("a.png").unwrap());
    }

    #[test]
    fn test_analyze_partitions_by_both_signals() {
        let temp_dir = TempDir::new().unwrap();
        let images = temp_dir.path().join("images");
        std::fs::create_dir(&images).unwrap();
        std::fs::write(images.join("raw_download.png"), b"1").unwrap();
        std::fs::write(images.join("財經_圖表.png"), b"2").unwrap();
        std::fs::write(images.join("tracked.png"), b"3").unwrap();

        let tracker = tracker_in(&temp_dir);
        tracker
            .record(&images, "tracked.png", "設計_草稿.png", RenameStatus::Success)
            .unwrap();

        let (unnamed, renamed) = tracker.analyze(&images, false).unwrap();
        assert_eq!(unnamed, vec!["raw_download.png"]);
        assert_eq!(renamed.len(), 2);
        assert!(renamed.contains(&"財經_圖表.png".to_string()));
        assert!(renamed.contains(&"tracked.png".to_string()));
    }

    #[test]
    fn test_analyze_force_treats_everything_as_unnamed() {
        let temp_dir = TempDir::new().unwrap();
        let images = temp_dir.path().join("images");
        std::fs::create_dir(&images).unwrap();
        std::fs::write(images.join("raw_download.png"), b"1").unwrap();
        std::fs::write(images.join("財經_圖表.png"), b"2").unwrap();

        let tracker = tracker_in(&temp_dir);
        let (unnamed, renamed) = tracker.analyze(&images, true).unwrap();
        assert_eq!(unnamed.len(), 2);
        assert!(renamed.is_empty());
    }

    #[test]
    fn test_analyze_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let tracker = tracker_in(&temp_dir);

        let result = tracker.analyze(&temp_dir.path().join("absent"), false);
        assert!(matches!(
            result,
            Err(TrackerError::Scan(ScanError::MissingDirectory { .. }))
        ));
    }
}
