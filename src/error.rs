//! Typed failures that abort an analysis run.
//!
//! Everything recoverable (a malformed line, an unrecognized file name, a
//! degenerate metric input) is handled where it occurs and never surfaces
//! here. These errors are wrapped in a `color_eyre::Report` by the caller so
//! the binary exits non-zero with a message naming the missing resource.

use std::path::PathBuf;

/// Invalid invocation: the inputs the user pointed at do not exist or
/// contain nothing this tool can analyze.
#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error("Results directory not found: {}", path.display())]
    DirectoryNotFound { path: PathBuf },

    #[error("Not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    #[error("Input file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("No {extension} files found in {}", dir.display())]
    NoInputFiles { dir: PathBuf, extension: String },

    #[error("No valid results found in {}", dir.display())]
    NoValidResults { dir: PathBuf },
}

/// Returns an error unless `dir` exists and is a directory.
pub fn ensure_directory(dir: &std::path::Path) -> Result<(), UsageError> {
    if !dir.exists() {
        return Err(UsageError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }
    if !dir.is_dir() {
        return Err(UsageError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }
    Ok(())
}
