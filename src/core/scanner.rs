use crate::core::hash::{self, HashError};
use glob::Pattern;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use walkdir::WalkDir;

/// Extensions treated as images. Downloads outside this list are never
/// touched by any operation.
pub const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "webp", "gif", "bmp"];

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("directory not found: {path}")]
    MissingDirectory { path: String },

    #[error("not a directory: {path}")]
    NotADirectory { path: String },

    #[error("invalid exclude pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One image file found in the target directory. Identity is its path;
/// the content digest is computed on first use and cached.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
    digest: Option<String>,
}

impl ImageFile {
    pub fn new(path: PathBuf, size: u64, modified: SystemTime) -> Self {
        Self {
            path,
            size,
            modified,
            digest: None,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn digest(&mut self) -> Result<String, HashError> {
        if let Some(digest) = &self.digest {
            return Ok(digest.clone());
        }
        let digest = hash::content_digest(&self.path)?;
        self.digest = Some(digest.clone());
        Ok(digest)
    }
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

pub fn compile_excludes(patterns: &[String]) -> Result<Vec<Pattern>, ScanError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|source| ScanError::Pattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

/// List the image files directly inside `dir`, sorted by file name so
/// scan order is deterministic across runs. Entries whose metadata
/// cannot be read are skipped with a warning.
pub fn list_images(dir: &Path, exclude: &[Pattern]) -> Result<Vec<ImageFile>, ScanError> {
    if !dir.exists() {
        return Err(ScanError::MissingDirectory {
            path: dir.to_string_lossy().into_owned(),
        });
    }
    if !dir.is_dir() {
        return Err(ScanError::NotADirectory {
            path: dir.to_string_lossy().into_owned(),
        });
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || !is_image_file(path) {
            continue;
        }

        let path_str = path.to_string_lossy();
        if exclude.iter().any(|pattern| pattern.matches(&path_str)) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(err) => {
                log::warn!("skipping {}: {}", path.display(), err);
                continue;
            }
        };
        let modified = match metadata.modified() {
            Ok(modified) => modified,
            Err(err) => {
                log::warn!("skipping {}: {}", path.display(), err);
                continue;
            }
        };

        images.push(ImageFile::new(path.to_path_buf(), metadata.len(), modified));
    }

    images.sort_by_key(|file| file.file_name());
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_extension_allow_list() {
        assert!(is_image_file(Path::new("shot.png")));
        assert!(is_image_file(Path::new("shot.JPEG")));
        assert!(is_image_file(Path::new("shot.webp")));
        assert!(!is_image_file(Path::new("notes.txt")));
        assert!(!is_image_file(Path::new("archive.tiff")));
        assert!(!is_image_file(Path::new("no_extension")));
    }

    #[test]
    fn test_lists_only_top_level_images_in_name_order() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("b.png"), b"b").unwrap();
        fs::write(temp_dir.path().join("a.jpg"), b"a").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), b"n").unwrap();
        let nested = temp_dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("deep.png"), b"d").unwrap();

        let images = list_images(temp_dir.path(), &[]).unwrap();
        let names: Vec<String> = images.iter().map(|f| f.file_name()).collect();
        assert_eq!(names, vec!["a.jpg", "b.png"]);
    }

    #[test]
    fn test_exclude_patterns() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("keep.png"), b"k").unwrap();
        fs::write(temp_dir.path().join("skip.tmp.png"), b"s").unwrap();

        let excludes = compile_excludes(&["*.tmp.*".to_string()]).unwrap();
        let images = list_images(temp_dir.path(), &excludes).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].file_name(), "keep.png");
    }

    #[test]
    fn test_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = list_images(&temp_dir.path().join("absent"), &[]);
        assert!(matches!(result, Err(ScanError::MissingDirectory { .. })));
    }

    #[test]
    fn test_invalid_exclude_pattern_fails() {
        let result = compile_excludes(&["[".to_string()]);
        assert!(matches!(result, Err(ScanError::Pattern { .. })));
    }

    #[test]
    fn test_digest_is_cached() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.png");
        fs::write(&path, b"original").unwrap();

        let mut images = list_images(temp_dir.path(), &[]).unwrap();
        let first = images[0].digest().unwrap();

        // Content changes after the first hash are not observed.
        fs::write(&path, b"rewritten").unwrap();
        let second = images[0].digest().unwrap();
        assert_eq!(first, second);
    }
}
