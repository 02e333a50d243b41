use crate::session::SessionPaths;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Run phases, strictly forward. Analysis and rename each reset the
/// processed counter to zero when they start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Initializing,
    Scanning,
    Scanned,
    Analyzing,
    Analyzed,
    Renaming,
    Completed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Initializing => "initializing",
            Phase::Scanning => "scanning",
            Phase::Scanned => "scanned",
            Phase::Analyzing => "analyzing",
            Phase::Analyzed => "analyzed",
            Phase::Renaming => "renaming",
            Phase::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// What gets written to the snapshot file after every mutation. The
/// file is overwritten in place, single writer, last write wins; an
/// external process polls it to observe the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub timestamp: String,
    pub phase: Phase,
    pub total_files: usize,
    pub processed_files: usize,
    pub successful_files: usize,
    pub failed_files: usize,
    pub progress_percent: u32,
    pub elapsed_seconds: f64,
    pub eta_seconds: f64,
    pub scan_complete: bool,
    pub analysis_complete: bool,
    pub rename_complete: bool,
}

impl ProgressSnapshot {
    pub fn load(path: &Path) -> Result<Self, ProgressError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Tracks one run through its phases, persisting a snapshot and a
/// timestamped log line on every update. Log lines are echoed to
/// stdout by default; that stream is the only channel the GUI process
/// observes, so the update-line shape must stay parseable.
pub struct ProgressTracker {
    snapshot_path: PathBuf,
    log_path: PathBuf,
    started: Instant,
    echo: bool,
    phase: Phase,
    total_files: usize,
    processed_files: usize,
    successful_files: usize,
    failed_files: usize,
    scan_complete: bool,
    analysis_complete: bool,
    rename_complete: bool,
}

impl ProgressTracker {
    pub fn new(paths: &SessionPaths, operation: &str) -> Self {
        Self {
            snapshot_path: paths.progress_file(operation),
            log_path: paths.progress_log_file(operation),
            started: Instant::now(),
            echo: true,
            phase: Phase::Initializing,
            total_files: 0,
            processed_files: 0,
            successful_files: 0,
            failed_files: 0,
            scan_complete: false,
            analysis_complete: false,
            rename_complete: false,
        }
    }

    /// Suppress the stdout echo; the log file is still written.
    pub fn silent(mut self) -> Self {
        self.echo = false;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn start_scan(&mut self, total_files: usize) -> Result<(), ProgressError> {
        self.phase = Phase::Scanning;
        self.total_files = total_files;
        self.processed_files = 0;
        self.log(&format!("📂 Scanning files... ({total_files} total)"))?;
        self.save_snapshot()
    }

    pub fn complete_scan(&mut self) -> Result<(), ProgressError> {
        self.phase = Phase::Scanned;
        self.scan_complete = true;
        self.log("✅ Scan complete")?;
        self.save_snapshot()
    }

    pub fn start_analysis(&mut self) -> Result<(), ProgressError> {
        self.phase = Phase::Analyzing;
        self.processed_files = 0;
        self.log(&format!("🤖 Analyzing {} images...", self.total_files))?;
        self.save_snapshot()
    }

    pub fn update_analysis(
        &mut self,
        batch_num: usize,
        processed: usize,
    ) -> Result<(), ProgressError> {
        self.phase = Phase::Analyzing;
        self.processed_files = processed;
        self.log(&format!(
            "  📦 Batch {batch_num:3} | progress {:3}% | processed {processed:4}/{} | ETA: {}",
            self.percent(),
            self.total_files,
            self.eta_display(),
        ))?;
        self.save_snapshot()
    }

    pub fn complete_analysis(
        &mut self,
        successful: usize,
        failed: usize,
    ) -> Result<(), ProgressError> {
        self.phase = Phase::Analyzed;
        self.analysis_complete = true;
        self.successful_files = successful;
        self.failed_files = failed;
        self.log(&format!(
            "✅ Analysis complete: {successful}/{} succeeded, {failed} failed",
            self.total_files
        ))?;
        self.save_snapshot()
    }

    pub fn start_rename(&mut self) -> Result<(), ProgressError> {
        self.phase = Phase::Renaming;
        self.processed_files = 0;
        self.log(&format!("🔄 Renaming {} files...", self.successful_files))?;
        self.save_snapshot()
    }

    pub fn update_rename(&mut self, processed: usize) -> Result<(), ProgressError> {
        self.phase = Phase::Renaming;
        self.processed_files = processed;

        // Rename progress is reported against the files that actually
        // get renamed, while the snapshot keeps the run-wide total.
        let rename_total = self.successful_files;
        if rename_total > 0 {
            let percent = processed * 100 / rename_total;
            self.log(&format!(
                "  📝 Rename progress {percent:3}% | renamed {processed:4}/{rename_total} | ETA: {}",
                self.eta_display(),
            ))?;
        }
        self.save_snapshot()
    }

    pub fn complete_rename(&mut self, renamed: usize, failed: usize) -> Result<(), ProgressError> {
        self.phase = Phase::Completed;
        self.rename_complete = true;
        self.log(&format!(
            "✅ Rename complete: {renamed} succeeded, {failed} failed | total time: {}",
            format_duration(self.started.elapsed().as_secs_f64()),
        ))?;
        self.save_snapshot()
    }

    /// Percent of total, floored; 0 when there is nothing to do.
    pub fn percent(&self) -> u32 {
        if self.total_files == 0 {
            return 0;
        }
        (self.processed_files * 100 / self.total_files) as u32
    }

    /// Average seconds per processed file times the files remaining.
    /// 0 until the first file lands.
    pub fn eta_seconds(&self) -> f64 {
        if self.processed_files == 0 {
            return 0.0;
        }
        let elapsed = self.started.elapsed().as_secs_f64();
        let per_file = elapsed / self.processed_files as f64;
        let remaining = self.total_files.saturating_sub(self.processed_files);
        (per_file * remaining as f64).max(0.0)
    }

    pub fn eta_display(&self) -> String {
        let eta = self.eta_seconds();
        if eta > 0.0 {
            format_duration(eta)
        } else {
            "calculating...".to_string()
        }
    }

    /// Append a timestamped line to the log file and echo it.
    pub fn log(&self, message: &str) -> Result<(), ProgressError> {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let line = format!("[{timestamp}] {message}");

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(file, "{line}")?;

        if self.echo {
            println!("{line}");
        }
        Ok(())
    }

    pub fn error(&self, message: &str) -> Result<(), ProgressError> {
        self.log(&format!("❌ {message}"))
    }

    pub fn warning(&self, message: &str) -> Result<(), ProgressError> {
        self.log(&format!("⚠️ {message}"))
    }

    fn save_snapshot(&self) -> Result<(), ProgressError> {
        let snapshot = ProgressSnapshot {
            timestamp: Local::now().to_rfc3339(),
            phase: self.phase,
            total_files: self.total_files,
            processed_files: self.processed_files,
            successful_files: self.successful_files,
            failed_files: self.failed_files,
            progress_percent: self.percent(),
            elapsed_seconds: self.started.elapsed().as_secs_f64(),
            eta_seconds: self.eta_seconds(),
            scan_complete: self.scan_complete,
            analysis_complete: self.analysis_complete,
            rename_complete: self.rename_complete,
        };
        fs::write(&self.snapshot_path, serde_json::to_string_pretty(&snapshot)?)?;
        Ok(())
    }
}

pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}
