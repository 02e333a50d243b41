use crate::core::progress::{ProgressError, ProgressTracker};
use crate::core::scanner::ScanError;
use crate::core::tracker::{self, NameTracker, RenameDetector, RenameStatus, TrackerError};
use crate::core::vision::{ImageAnalysis, ImageAnalyzer, VisionError};
use crate::session::SessionPaths;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Progress(#[from] ProgressError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Success,
    Error,
}

/// Outcome of analyzing one file: a successful analysis or the last
/// error after retries ran out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub filename: String,
    pub status: AnalysisStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<ImageAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub run_id: String,
    pub timestamp: String,
    pub total_processed: usize,
    pub successful: usize,
    pub failed: usize,
}

/// Persisted after every batch so a crash loses at most one batch of
/// analysis work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub metadata: CheckpointMetadata,
    pub results: Vec<FileAnalysis>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenamePlanEntry {
    pub old_filename: String,
    pub new_filename: String,
    pub image_title: String,
    pub main_theme: String,
    pub sub_theme: String,
    pub core_content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameFailure {
    pub old: String,
    pub new: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub timestamp: String,
    pub target_dir: String,
    pub total_images: usize,
    pub skipped_renamed: usize,
    pub analyzed: usize,
    pub successful_analysis: usize,
    pub failed_analysis: usize,
    pub renamed: usize,
    pub rename_errors: usize,
    pub errors: Vec<RenameFailure>,
    pub delete_original: bool,
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub retry_attempts: usize,
    /// Pause before each retry of a failed analysis.
    pub retry_delay: Duration,
    /// Pause between consecutive files, to avoid hammering the model.
    pub pacing_delay: Duration,
    pub force: bool,
    pub delete_original: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            retry_attempts: 3,
            retry_delay: Duration::from_secs(2),
            pacing_delay: Duration::from_millis(500),
            force: false,
            delete_original: false,
        }
    }
}

/// Drives one rename run end to end: filter through the name tracker,
/// analyze in fixed-size batches with checkpointing, build and
/// de-collide the rename plan, execute the renames, write the report.
pub struct BatchRenamer<'a, A: ImageAnalyzer, D: RenameDetector> {
    analyzer: &'a A,
    tracker: &'a NameTracker<D>,
    paths: &'a SessionPaths,
    config: BatchConfig,
}

impl<'a, A: ImageAnalyzer, D: RenameDetector> BatchRenamer<'a, A, D> {
    pub fn new(
        analyzer: &'a A,
        tracker: &'a NameTracker<D>,
        paths: &'a SessionPaths,
        config: BatchConfig,
    ) -> Self {
        Self {
            analyzer,
            tracker,
            paths,
            config,
        }
    }

    pub fn run(
        &self,
        dir: &Path,
        progress: &mut ProgressTracker,
    ) -> Result<RunReport, BatchError> {
        let run_id = format!("run_{}", Uuid::new_v4().simple());

        let (unnamed, already_named) = self.tracker.analyze(dir, self.config.force)?;
        progress.start_scan(unnamed.len())?;
        if !already_named.is_empty() {
            progress.log(&format!(
                "⏭️ Skipping {} already-named files (use --force-rename to redo them)",
                already_named.len()
            ))?;
        }
        progress.complete_scan()?;

        // Resume: carry forward successful results for files still in
        // this run's target list; prior failures are retried fresh.
        let targets: HashSet<&String> = unnamed.iter().collect();
        let mut results: Vec<FileAnalysis> = Vec::new();
        if let Some(checkpoint) = self.load_checkpoint() {
            for result in checkpoint.results {
                if result.status == AnalysisStatus::Success && targets.contains(&result.filename) {
                    results.push(result);
                }
            }
            if !results.is_empty() {
                progress.log(&format!(
                    "📂 Resuming from checkpoint: {} files already analyzed",
                    results.len()
                ))?;
            }
        }
        let done: HashSet<String> = results.iter().map(|r| r.filename.clone()).collect();
        let pending: Vec<String> = unnamed
            .iter()
            .filter(|name| !done.contains(*name))
            .cloned()
            .collect();

        progress.start_analysis()?;
        let mut processed = results.len();
        let mut successful = results.len();
        let mut failed = 0usize;

        for (batch_index, batch) in pending.chunks(self.config.batch_size.max(1)).enumerate() {
            let batch_num = batch_index + 1;
            for name in batch {
                let path = dir.join(name);
                match self.analyze_with_retry(&path, progress)? {
                    Ok(analysis) => {
                        successful += 1;
                        results.push(FileAnalysis {
                            filename: name.clone(),
                            status: AnalysisStatus::Success,
                            analysis: Some(analysis),
                            error: None,
                        });
                    }
                    Err(err) => {
                        failed += 1;
                        results.push(FileAnalysis {
                            filename: name.clone(),
                            status: AnalysisStatus::Error,
                            analysis: None,
                            error: Some(err.to_string()),
                        });
                    }
                }
                processed += 1;
                progress.update_analysis(batch_num, processed)?;

                if !self.config.pacing_delay.is_zero() {
                    thread::sleep(self.config.pacing_delay);
                }
            }
            self.save_checkpoint(&run_id, &results)?;
        }
        progress.complete_analysis(successful, failed)?;

        let mut plan = build_plan(&results);
        resolve_plan_collisions(&mut plan);
        self.write_json(&self.paths.plan_file(), &plan)?;

        progress.start_rename()?;
        let mut renamed_count = 0usize;
        let mut failures: Vec<RenameFailure> = Vec::new();
        let mut attempted = 0usize;

        for entry in plan.iter_mut() {
            attempted += 1;
            let old_path = dir.join(&entry.old_filename);

            if !old_path.exists() {
                failures.push(RenameFailure {
                    old: entry.old_filename.clone(),
                    new: entry.new_filename.clone(),
                    error: "source file no longer exists".to_string(),
                });
                self.tracker.record(
                    dir,
                    &entry.old_filename,
                    &entry.new_filename,
                    RenameStatus::Failed,
                )?;
                progress.error(&format!("{} is gone, skipping rename", entry.old_filename))?;
                progress.update_rename(attempted)?;
                continue;
            }

            // Independent of the in-plan pass: the live filesystem may
            // hold names the plan never saw.
            let mut new_path = dir.join(&entry.new_filename);
            if new_path.exists() && new_path != old_path {
                let (stem, ext) = split_name(&entry.new_filename);
                let mut counter = 1usize;
                let resolved = loop {
                    let candidate = format!("{stem}_{counter:02}{ext}");
                    if !dir.join(&candidate).exists() {
                        break candidate;
                    }
                    counter += 1;
                };
                log::warn!(
                    "target {} already exists on disk, using {}",
                    entry.new_filename,
                    resolved
                );
                entry.new_filename = resolved;
                new_path = dir.join(&entry.new_filename);
            }

            match fs::rename(&old_path, &new_path) {
                Ok(()) => {
                    renamed_count += 1;
                    self.tracker.record(
                        dir,
                        &entry.old_filename,
                        &entry.new_filename,
                        RenameStatus::Success,
                    )?;
                    progress.log(&format!(
                        "✅ {} → {}",
                        entry.old_filename, entry.new_filename
                    ))?;
                }
                Err(err) => {
                    failures.push(RenameFailure {
                        old: entry.old_filename.clone(),
                        new: entry.new_filename.clone(),
                        error: err.to_string(),
                    });
                    self.tracker.record(
                        dir,
                        &entry.old_filename,
                        &entry.new_filename,
                        RenameStatus::Failed,
                    )?;
                    progress.error(&format!(
                        "rename {} → {} failed: {}",
                        entry.old_filename, entry.new_filename, err
                    ))?;
                }
            }
            progress.update_rename(attempted)?;
        }
        progress.complete_rename(renamed_count, failures.len())?;

        if self.config.delete_original {
            progress.log("🗑️ Original files were replaced in place; nothing further to delete")?;
        }

        // Rewrite the plan with the names actually used on disk.
        self.write_json(&self.paths.plan_file(), &plan)?;

        let report = RunReport {
            run_id,
            timestamp: Utc::now().to_rfc3339(),
            target_dir: tracker::directory_key(dir),
            total_images: unnamed.len(),
            skipped_renamed: already_named.len(),
            analyzed: results.len(),
            successful_analysis: successful,
            failed_analysis: failed,
            renamed: renamed_count,
            rename_errors: failures.len(),
            errors: failures,
            delete_original: self.config.delete_original,
        };
        self.write_json(&self.paths.final_report_file(), &report)?;
        Ok(report)
    }

    /// Bounded retry around the analysis call. Returns `Ok(Err(_))`
    /// when every attempt failed: exhaustion is a per-file outcome,
    /// not a run error.
    fn analyze_with_retry(
        &self,
        path: &Path,
        progress: &ProgressTracker,
    ) -> Result<Result<ImageAnalysis, VisionError>, BatchError> {
        let mut last_error = None;
        for attempt in 1..=self.config.retry_attempts.max(1) {
            if attempt > 1 && !self.config.retry_delay.is_zero() {
                thread::sleep(self.config.retry_delay);
            }
            match self.analyzer.analyze(path) {
                Ok(analysis) => return Ok(Ok(analysis)),
                Err(err) => {
                    progress.warning(&format!(
                        "analysis attempt {attempt} failed for {}: {err}",
                        path.display()
                    ))?;
                    last_error = Some(err);
                }
            }
        }
        Ok(Err(last_error.unwrap_or_else(|| VisionError::Malformed {
            message: "no analysis attempts were made".to_string(),
        })))
    }

    /// A checkpoint that cannot be read is treated as absent.
    fn load_checkpoint(&self) -> Option<Checkpoint> {
        let path = self.paths.checkpoint_file();
        if !path.exists() {
            return None;
        }
        match fs::read_to_string(&path).map_err(|err| err.to_string()).and_then(|raw| {
            serde_json::from_str::<Checkpoint>(&raw).map_err(|err| err.to_string())
        }) {
            Ok(checkpoint) => Some(checkpoint),
            Err(err) => {
                log::warn!("ignoring unreadable checkpoint {}: {}", path.display(), err);
                None
            }
        }
    }

    fn save_checkpoint(&self, run_id: &str, results: &[FileAnalysis]) -> Result<(), BatchError> {
        let successful = results
            .iter()
            .filter(|r| r.status == AnalysisStatus::Success)
            .count();
        let checkpoint = Checkpoint {
            metadata: CheckpointMetadata {
                run_id: run_id.to_string(),
                timestamp: Utc::now().to_rfc3339(),
                total_processed: results.len(),
                successful,
                failed: results.len() - successful,
            },
            results: results.to_vec(),
        };
        self.write_json(&self.paths.checkpoint_file(), &checkpoint)
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), BatchError> {
        fs::write(path, serde_json::to_string_pretty(value)?)?;
        Ok(())
    }
}

/// Rename plan from the successful analyses only; failed files are
/// reported but never renamed. The original extension is appended when
/// the model left it off.
fn build_plan(results: &[FileAnalysis]) -> Vec<RenamePlanEntry> {
    let mut plan = Vec::new();
    for result in results {
        if result.status != AnalysisStatus::Success {
            continue;
        }
        let Some(analysis) = &result.analysis else {
            continue;
        };

        let mut new_name = analysis.recommended_name.clone();
        let (_, ext) = split_name(&result.filename);
        if !ext.is_empty() && !new_name.to_lowercase().ends_with(&ext.to_lowercase()) {
            new_name.push_str(ext);
        }

        plan.push(RenamePlanEntry {
            old_filename: result.filename.clone(),
            new_filename: new_name,
            image_title: analysis.image_title.clone(),
            main_theme: analysis.main_theme.clone(),
            sub_theme: analysis.sub_theme.clone(),
            core_content: analysis.core_content.clone(),
        });
    }
    plan
}

/// Make target names unique within the plan: the first occurrence
/// keeps the bare name, later ones get `_01`, `_02`, and so on,
/// re-checked against every name claimed so far.
pub fn resolve_plan_collisions(plan: &mut [RenamePlanEntry]) {
    let mut claimed: HashSet<String> = HashSet::new();
    for entry in plan.iter_mut() {
        if claimed.insert(entry.new_filename.clone()) {
            continue;
        }
        let (stem, ext) = split_name(&entry.new_filename);
        let mut counter = 1usize;
        let resolved = loop {
            let candidate = format!("{stem}_{counter:02}{ext}");
            if !claimed.contains(&candidate) {
                break candidate;
            }
            counter += 1;
        };
        log::warn!(
            "duplicate target name {}, using {}",
            entry.new_filename,
            resolved
        );
        claimed.insert(resolved.clone());
        entry.new_filename = resolved;
    }
}

/// Split a file name into stem and `.ext` suffix (empty when there is
/// no extension).
fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(index) if index > 0 => (&name[..index], &name[index..]),
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vision::ImageAnalysis;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use tempfile::TempDir;

    struct MockAnalyzer {
        names: HashMap<String, String>,
        fail: HashSet<String>,
        delete_after: HashSet<String>,
        calls: RefCell<Vec<String>>,
    }

    impl MockAnalyzer {
        fn new() -> Self {
            Self {
                names: HashMap::new(),
                fail: HashSet::new(),
                delete_after: HashSet::new(),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn naming(mut self, old: &str, recommended: &str) -> Self {
            self.names.insert(old.to_string(), recommended.to_string());
            self
        }

        fn failing_on(mut self, name: &str) -> Self {
            self.fail.insert(name.to_string());
            self
        }

        /// Simulates a file vanishing between analysis and rename.
        fn deleting(mut self, name: &str) -> Self {
            self.delete_after.insert(name.to_string());
            self
        }

        fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    impl ImageAnalyzer for MockAnalyzer {
        fn analyze(&self, image: &Path) -> Result<ImageAnalysis, VisionError> {
            let name = image
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.calls.borrow_mut().push(name.clone());

            if self.fail.contains(&name) {
                return Err(VisionError::Malformed {
                    message: "mock refusal".to_string(),
                });
            }
            if self.delete_after.contains(&name) {
                std::fs::remove_file(image).unwrap();
            }
            let (stem, _) = split_name(&name);
            let recommended = self
                .names
                .get(&name)
                .cloned()
                .unwrap_or_else(|| format!("圖表_{stem}"));
            Ok(ImageAnalysis {
                image_title: "N/A".to_string(),
                main_theme: "測試".to_string(),
                sub_theme: "樣本".to_string(),
                core_content: "content".to_string(),
                recommended_name: recommended,
            })
        }
    }

    struct Fixture {
        _temp: TempDir,
        images: std::path::PathBuf,
        paths: SessionPaths,
        tracker: NameTracker,
    }

    fn fixture(file_count: usize) -> Fixture {
        let temp = TempDir::new().unwrap();
        let images = temp.path().join("images");
        std::fs::create_dir(&images).unwrap();
        for i in 0..file_count {
            std::fs::write(images.join(format!("file_{i:02}.png")), format!("img {i}")).unwrap();
        }
        let paths = SessionPaths::new(temp.path().join("session")).unwrap();
        let tracker = NameTracker::new(temp.path().join(".renamed_tracker.json"));
        Fixture {
            _temp: temp,
            images,
            paths,
            tracker,
        }
    }

    fn quick_config() -> BatchConfig {
        BatchConfig {
            retry_delay: Duration::ZERO,
            pacing_delay: Duration::ZERO,
            ..BatchConfig::default()
        }
    }

    fn run(fx: &Fixture, analyzer: &MockAnalyzer, config: BatchConfig) -> RunReport {
        let renamer = BatchRenamer::new(analyzer, &fx.tracker, &fx.paths, config);
        let mut progress = ProgressTracker::new(&fx.paths, "rename").silent();
        renamer.run(&fx.images, &mut progress).unwrap()
    }

    #[test]
    fn test_processes_in_batches_and_checkpoints() {
        let fx = fixture(25);
        let analyzer = MockAnalyzer::new();
        let report = run(&fx, &analyzer, quick_config());

        assert_eq!(report.total_images, 25);
        assert_eq!(report.analyzed, 25);
        assert_eq!(report.successful_analysis, 25);
        assert_eq!(report.renamed, 25);
        assert_eq!(analyzer.call_count(), 25);

        let checkpoint: Checkpoint = serde_json::from_str(
            &std::fs::read_to_string(fx.paths.checkpoint_file()).unwrap(),
        )
        .unwrap();
        assert_eq!(checkpoint.results.len(), 25);
        assert_eq!(checkpoint.metadata.successful, 25);
    }

    #[test]
    fn test_resume_skips_checkpointed_successes() {
        let fx = fixture(25);

        // Simulate a run that died after checkpointing two batches.
        let prior: Vec<FileAnalysis> = (0..20)
            .map(|i| FileAnalysis {
                filename: format!("file_{i:02}.png"),
                status: AnalysisStatus::Success,
                analysis: Some(ImageAnalysis {
                    image_title: "N/A".to_string(),
                    main_theme: "測試".to_string(),
                    sub_theme: "樣本".to_string(),
                    core_content: "content".to_string(),
                    recommended_name: format!("圖表_file_{i:02}"),
                }),
                error: None,
            })
            .collect();
        let checkpoint = Checkpoint {
            metadata: CheckpointMetadata {
                run_id: "run_dead".to_string(),
                timestamp: Utc::now().to_rfc3339(),
                total_processed: 20,
                successful: 20,
                failed: 0,
            },
            results: prior,
        };
        std::fs::write(
            fx.paths.checkpoint_file(),
            serde_json::to_string_pretty(&checkpoint).unwrap(),
        )
        .unwrap();

        let analyzer = MockAnalyzer::new();
        let report = run(&fx, &analyzer, quick_config());

        // Only the last partial batch is analyzed again.
        assert_eq!(analyzer.call_count(), 5);
        assert_eq!(report.analyzed, 25);
        assert_eq!(report.renamed, 25);
    }

    #[test]
    fn test_failed_analysis_is_reported_not_renamed() {
        let fx = fixture(3);
        let analyzer = MockAnalyzer::new().failing_on("file_01.png");
        let config = BatchConfig {
            retry_attempts: 2,
            ..quick_config()
        };
        let report = run(&fx, &analyzer, config);

        assert_eq!(report.successful_analysis, 2);
        assert_eq!(report.failed_analysis, 1);
        assert_eq!(report.renamed, 2);
        // Two attempts for the failing file, one for each other.
        assert_eq!(analyzer.call_count(), 4);
        // The failed file keeps its original name.
        assert!(fx.images.join("file_01.png").exists());

        let checkpoint: Checkpoint = serde_json::from_str(
            &std::fs::read_to_string(fx.paths.checkpoint_file()).unwrap(),
        )
        .unwrap();
        let failed = checkpoint
            .results
            .iter()
            .find(|r| r.filename == "file_01.png")
            .unwrap();
        assert_eq!(failed.status, AnalysisStatus::Error);
        assert!(failed.error.as_deref().unwrap().contains("mock refusal"));
    }

    #[test]
    fn test_plan_collisions_resolved_in_order() {
        let mut plan: Vec<RenamePlanEntry> = (0..3)
            .map(|i| RenamePlanEntry {
                old_filename: format!("src_{i}.png"),
                new_filename: "Report_A.png".to_string(),
                image_title: "N/A".to_string(),
                main_theme: "N/A".to_string(),
                sub_theme: "N/A".to_string(),
                core_content: "N/A".to_string(),
            })
            .collect();

        resolve_plan_collisions(&mut plan);

        let names: Vec<&str> = plan.iter().map(|e| e.new_filename.as_str()).collect();
        assert_eq!(names, vec!["Report_A.png", "Report_A_01.png", "Report_A_02.png"]);
    }

    #[test]
    fn test_plan_collision_suffix_rechecked_until_unique() {
        let mut plan = vec![
            RenamePlanEntry {
                old_filename: "a.png".to_string(),
                new_filename: "Chart.png".to_string(),
                image_title: "N/A".to_string(),
                main_theme: "N/A".to_string(),
                sub_theme: "N/A".to_string(),
                core_content: "N/A".to_string(),
            },
            RenamePlanEntry {
                old_filename: "b.png".to_string(),
                new_filename: "Chart_01.png".to_string(),
                image_title: "N/A".to_string(),
                main_theme: "N/A".to_string(),
                sub_theme: "N/A".to_string(),
                core_content: "N/A".to_string(),
            },
            RenamePlanEntry {
                old_filename: "c.png".to_string(),
                new_filename: "Chart.png".to_string(),
                image_title: "N/A".to_string(),
                main_theme: "N/A".to_string(),
                sub_theme: "N/A".to_string(),
                core_content: "N/A".to_string(),
            },
        ];

        resolve_plan_collisions(&mut plan);

        // The first suffix candidate is taken, so the collision walks on.
        let names: Vec<&str> = plan.iter().map(|e| e.new_filename.as_str()).collect();
        assert_eq!(names, vec!["Chart.png", "Chart_01.png", "Chart_02.png"]);
    }

    #[test]
    fn test_disk_collision_gets_numeric_suffix() {
        let fx = fixture(0);
        std::fs::write(fx.images.join("a.png"), b"source").unwrap();
        // Already on disk, already named, so the scan skips it but the
        // rename target clashes with it.
        std::fs::write(fx.images.join("財務報告.png"), b"existing").unwrap();

        let analyzer = MockAnalyzer::new().naming("a.png", "財務報告");
        let report = run(&fx, &analyzer, quick_config());

        assert_eq!(report.renamed, 1);
        assert!(fx.images.join("財務報告.png").exists());
        assert!(fx.images.join("財務報告_01.png").exists());
        assert!(!fx.images.join("a.png").exists());

        // The plan on disk reflects the name actually used.
        let plan: Vec<RenamePlanEntry> = serde_json::from_str(
            &std::fs::read_to_string(fx.paths.plan_file()).unwrap(),
        )
        .unwrap();
        assert_eq!(plan[0].new_filename, "財務報告_01.png");
    }

    #[test]
    fn test_renamed_files_recorded_and_skipped_next_run() {
        let fx = fixture(2);
        let analyzer = MockAnalyzer::new();
        let report = run(&fx, &analyzer, quick_config());
        assert_eq!(report.renamed, 2);
        assert!(fx.tracker.is_renamed("file_00.png").unwrap());

        // Second run: nothing left to do, the model is never called.
        let analyzer2 = MockAnalyzer::new();
        let report2 = run(&fx, &analyzer2, quick_config());
        assert_eq!(report2.total_images, 0);
        assert_eq!(report2.skipped_renamed, 2);
        assert_eq!(analyzer2.call_count(), 0);
    }

    #[test]
    fn test_missing_source_recorded_as_failure() {
        let fx = fixture(2);
        // file_00.png vanishes right after its analysis succeeds.
        let analyzer = MockAnalyzer::new().deleting("file_00.png");
        let report = run(&fx, &analyzer, quick_config());

        assert_eq!(report.successful_analysis, 2);
        assert_eq!(report.renamed, 1);
        assert_eq!(report.rename_errors, 1);
        assert_eq!(report.errors[0].old, "file_00.png");
        assert!(report.errors[0].error.contains("no longer exists"));
    }

    #[test]
    fn test_extension_appended_to_recommended_name() {
        let results = vec![FileAnalysis {
            filename: "shot.jpeg".to_string(),
            status: AnalysisStatus::Success,
            analysis: Some(ImageAnalysis {
                image_title: "N/A".to_string(),
                main_theme: "N/A".to_string(),
                sub_theme: "N/A".to_string(),
                core_content: "N/A".to_string(),
                recommended_name: "設計_草稿".to_string(),
            }),
            error: None,
        }];

        let plan = build_plan(&results);
        assert_eq!(plan[0].new_filename, "設計_草稿.jpeg");
    }

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("a.png"), ("a", ".png"));
        assert_eq!(split_name("archive.tar.gz"), ("archive.tar", ".gz"));
        assert_eq!(split_name("noext"), ("noext", ""));
        assert_eq!(split_name(".hidden"), (".hidden", ""));
    }
}
