//! Source discovery.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::CoreError;

pub const SOURCE_EXTENSION: &str = "kn";

/// Expand `inputs` into the list of source files to compile.
///
/// Files are taken as given, whatever their extension. Directories are
/// walked recursively for `.kn` files, in file name order.
pub fn collect_sources(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, CoreError> {
    let mut files = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }
        let before = files.len();
        for entry in WalkDir::new(input).sort_by_file_name() {
            let entry = entry.map_err(|err| CoreError::SourceIo {
                path: err.path().unwrap_or(input.as_path()).to_path_buf(),
                source: io::Error::from(err),
            })?;
            let path = entry.path();
            if entry.file_type().is_file() && is_source(path) {
                files.push(path.to_path_buf());
            }
        }
        debug!(dir = %input.display(), found = files.len() - before, "collected sources");
    }
    Ok(files)
}

pub fn is_source(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION)
}

pub fn read_source(path: &Path) -> Result<String, CoreError> {
    fs::read_to_string(path).map_err(|source| CoreError::SourceIo {
        path: path.to_path_buf(),
        source,
    })
}
