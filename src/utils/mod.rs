//! Shared utilities: results-directory discovery.

pub mod files;

pub use files::{file_name_str, list_files_with_extension, require_input_files};
