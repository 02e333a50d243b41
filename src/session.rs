use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// File name of the installation-wide rename ledger.
pub const TRACKER_FILE_NAME: &str = ".renamed_tracker.json";

/// Default location for per-run session artifacts.
pub fn default_session_root() -> PathBuf {
    data_root().join("sessions")
}

/// The rename ledger is shared by every run of this installation.
pub fn default_tracker_file() -> PathBuf {
    data_root().join("tracking").join(TRACKER_FILE_NAME)
}

fn data_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("picnamer")
}

/// Layout of the session directory: reports, checkpoints and progress
/// files for one run live side by side under a single root.
#[derive(Debug, Clone)]
pub struct SessionPaths {
    root: PathBuf,
}

impl SessionPaths {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cleanup_report_file(&self) -> PathBuf {
        self.root.join("cleanup_report.json")
    }

    pub fn checkpoint_file(&self) -> PathBuf {
        self.root.join("analysis_checkpoint.json")
    }

    pub fn plan_file(&self) -> PathBuf {
        self.root.join("rename_plan.json")
    }

    pub fn final_report_file(&self) -> PathBuf {
        self.root.join("rename_report.json")
    }

    pub fn progress_file(&self, operation: &str) -> PathBuf {
        self.root.join(format!("progress_{operation}.json"))
    }

    pub fn progress_log_file(&self, operation: &str) -> PathBuf {
        self.root.join(format!("progress_log_{operation}.txt"))
    }
}
