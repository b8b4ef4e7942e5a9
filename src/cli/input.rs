//! Input discovery for the command line
//!
//! Expands the positional inputs into a sorted, de-duplicated list of
//! instrument files and reads the reserved point names file.

use crate::decoders::SourceFormat;
use crate::error::{ImportError, Result};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Expand files, directories and glob patterns into instrument files.
///
/// Explicit files are kept whatever their extension so that `--format` can
/// name the format. Directory and glob matches are filtered by extension
/// unless `format` is given.
pub fn collect_input_files(inputs: &[PathBuf], format: Option<SourceFormat>) -> Result<Vec<PathBuf>> {
    let mut files = BTreeSet::new();

    for input in inputs {
        if input.is_file() {
            files.insert(input.clone());
        } else if input.is_dir() {
            files.extend(walk_directory(input, format));
        } else {
            let matches = expand_glob(input)?;
            if matches.is_empty() {
                return Err(ImportError::FileNotFound {
                    path: input.clone(),
                });
            }
            files.extend(
                matches
                    .into_iter()
                    .filter(|path| is_instrument_file(path, format)),
            );
        }
    }

    debug!("Collected {} input files", files.len());
    Ok(files.into_iter().collect())
}

fn is_instrument_file(path: &Path, format: Option<SourceFormat>) -> bool {
    path.is_file() && (format.is_some() || SourceFormat::from_path(path).is_some())
}

fn walk_directory(root: &Path, format: Option<SourceFormat>) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                let path = entry.into_path();
                let known = match format {
                    Some(format) => SourceFormat::from_path(&path) == Some(format),
                    None => SourceFormat::from_path(&path).is_some(),
                };
                if known {
                    files.push(path);
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable entry under {}: {}", root.display(), e),
        }
    }
    files
}

fn expand_glob(pattern: &Path) -> Result<Vec<PathBuf>> {
    let pattern = pattern.to_string_lossy();
    let paths = glob::glob(&pattern).map_err(|e| ImportError::Configuration {
        message: format!("Invalid input pattern '{}': {}", pattern, e),
    })?;

    let mut matches = Vec::new();
    for path in paths {
        match path {
            Ok(path) => matches.push(path),
            Err(e) => warn!("Skipping unreadable glob match: {}", e),
        }
    }
    Ok(matches)
}

/// Point names from a text file, one per line. Blank lines and lines
/// starting with `#` are ignored.
pub fn read_reserved_points(path: &Path) -> Result<HashSet<String>> {
    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ImportError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => ImportError::Io(e),
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
