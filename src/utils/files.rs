//! Results-directory discovery.

use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result};

use crate::error::{ensure_directory, UsageError};

/// List regular files in `dir` whose extension equals `extension`
/// (without the dot), sorted by path. Not recursive.
pub fn list_files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| path.extension().map_or(false, |ext| ext == extension))
        .collect();
    files.sort();
    Ok(files)
}

/// Validate `dir` and return its `extension` files, failing with a usage
/// error when the directory is missing or holds no such file.
pub fn require_input_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    ensure_directory(dir)?;
    let files = list_files_with_extension(dir, extension)?;
    if files.is_empty() {
        return Err(UsageError::NoInputFiles {
            dir: dir.to_path_buf(),
            extension: format!(".{}", extension),
        }
        .into());
    }
    Ok(files)
}

/// File name as UTF-8, empty when the path has none
pub fn file_name_str(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_matching_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.log"), "").unwrap();
        fs::write(dir.path().join("a.log"), "").unwrap();
        fs::write(dir.path().join("c.csv"), "").unwrap();
        fs::create_dir(dir.path().join("d.log")).unwrap();

        let files = list_files_with_extension(dir.path(), "log").unwrap();
        let names: Vec<&str> = files.iter().map(|p| file_name_str(p)).collect();
        assert_eq!(names, vec!["a.log", "b.log"]);
    }

    #[test]
    fn test_require_input_files_errors() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let err = require_input_files(dir.path(), "csv").unwrap_err();
        let usage = err.downcast_ref::<UsageError>().unwrap();
        assert!(matches!(usage, UsageError::NoInputFiles { .. }));

        let err = require_input_files(&dir.path().join("missing"), "csv").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<UsageError>(),
            Some(UsageError::DirectoryNotFound { .. })
        ));
    }
}
