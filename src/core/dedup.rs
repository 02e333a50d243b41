use crate::core::scanner::{self, ImageFile, ScanError};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DedupError {
    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// One duplicate copy slated for deletion and the file it loses to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateRecord {
    pub keep: String,
    pub delete: String,
    pub digest: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteFailure {
    pub file: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupReport {
    pub original_count: usize,
    pub duplicates_found: usize,
    pub remaining_count: usize,
    pub deleted_count: usize,
    pub duplicate_details: Vec<DuplicateRecord>,
    pub delete_failures: Vec<DeleteFailure>,
}

/// Scan `dir` for byte-identical images, keep the newest copy of each
/// and delete the rest. Runs sequentially in one pass; per-file delete
/// failures are recorded and do not stop the sweep. Files that cannot
/// be hashed are excluded from every count.
///
/// With `dry_run` the report shows what would be deleted but no file
/// is touched. A second run over the same directory finds nothing.
pub fn deduplicate(
    dir: &Path,
    exclude: &[Pattern],
    dry_run: bool,
) -> Result<CleanupReport, DedupError> {
    let files = scanner::list_images(dir, exclude)?;

    let mut hashed: Vec<(String, ImageFile)> = Vec::new();
    for mut file in files {
        match file.digest() {
            Ok(digest) => hashed.push((digest, file)),
            Err(err) => log::warn!("skipping unreadable file {}: {}", file.path.display(), err),
        }
    }
    let original_count = hashed.len();

    // Group by digest, preserving scan order of first appearance.
    let mut group_index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<ImageFile>)> = Vec::new();
    for (digest, file) in hashed {
        match group_index.get(&digest) {
            Some(&index) => groups[index].1.push(file),
            None => {
                group_index.insert(digest.clone(), groups.len());
                groups.push((digest, vec![file]));
            }
        }
    }

    let mut report = CleanupReport {
        original_count,
        duplicates_found: 0,
        remaining_count: original_count,
        deleted_count: 0,
        duplicate_details: Vec::new(),
        delete_failures: Vec::new(),
    };

    for (digest, mut members) in groups {
        if members.len() < 2 {
            continue;
        }

        // Newest first; the stable sort leaves ties in scan order.
        members.sort_by(|a, b| b.modified.cmp(&a.modified));
        let keep_name = members[0].file_name();

        for duplicate in &members[1..] {
            report.duplicate_details.push(DuplicateRecord {
                keep: keep_name.clone(),
                delete: duplicate.file_name(),
                digest: digest.clone(),
                size: duplicate.size,
            });

            if dry_run {
                continue;
            }
            match fs::remove_file(&duplicate.path) {
                Ok(()) => report.deleted_count += 1,
                Err(err) => {
                    log::warn!("failed to delete {}: {}", duplicate.path.display(), err);
                    report.delete_failures.push(DeleteFailure {
                        file: duplicate.file_name(),
                        error: err.to_string(),
                    });
                }
            }
        }
    }

    report.duplicates_found = report.duplicate_details.len();
    report.remaining_count = original_count - report.duplicates_found;
    Ok(report)
}
