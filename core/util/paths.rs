//! Resolving the glob patterns rules declare, always relative to a component directory.
//!
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Invalid pattern {pattern:?}: {err}")]
    InvalidPattern {
        pattern: String,
        err: glob::PatternError,
    },

    #[error("Could not read {path:?} while matching {pattern:?}: {err}")]
    CouldNotRead {
        pattern: String,
        path: PathBuf,
        err: std::io::Error,
    },

    #[error("Could not walk {path:?}: {err}")]
    CouldNotWalk { path: PathBuf, err: ignore::Error },
}

fn glob_in(dir: &Path, pattern: &str) -> Result<glob::Paths, PathError> {
    let full = format!(
        "{}/{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        pattern.trim_start_matches("./")
    );
    glob::glob(&full).map_err(|err| PathError::InvalidPattern {
        pattern: pattern.to_string(),
        err,
    })
}

/// Every path (file or directory) `pattern` matches under `dir`, relative to `dir`.
pub fn matches(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, PathError> {
    let mut found = vec![];
    for entry in glob_in(dir, pattern)? {
        let path = entry.map_err(|err| PathError::CouldNotRead {
            pattern: pattern.to_string(),
            path: err.path().to_path_buf(),
            err: err.into_error(),
        })?;
        if let Ok(relative) = path.strip_prefix(dir) {
            found.push(relative.to_path_buf());
        }
    }
    Ok(found)
}

/// Whether `pattern` matches at least one path under `dir`.
pub fn matches_any(dir: &Path, pattern: &str) -> Result<bool, PathError> {
    Ok(!matches(dir, pattern)?.is_empty())
}

/// Expands every pattern into the files it covers, relative to `dir`. Matched directories are
/// expanded recursively. The result is sorted and free of duplicates.
pub fn expand_files(dir: &Path, patterns: &[String]) -> Result<Vec<PathBuf>, PathError> {
    let mut files = vec![];
    for pattern in patterns {
        for relative in matches(dir, pattern)? {
            let path = dir.join(&relative);
            if path.is_dir() {
                let walker = ignore::WalkBuilder::new(&path)
                    .standard_filters(false)
                    .sort_by_file_name(|a, b| a.cmp(b))
                    .build();
                for entry in walker {
                    let entry = entry.map_err(|err| PathError::CouldNotWalk {
                        path: path.clone(),
                        err,
                    })?;
                    if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                        if let Ok(relative) = entry.path().strip_prefix(dir) {
                            files.push(relative.to_path_buf());
                        }
                    }
                }
            } else if path.is_file() {
                files.push(relative);
            }
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn expands_globs_and_directories() {
        let dir = assert_fs::TempDir::new().unwrap();
        dir.child("src/main.go").touch().unwrap();
        dir.child("src/util/strings.go").touch().unwrap();
        dir.child("README.md").touch().unwrap();
        dir.child("go.mod").touch().unwrap();

        let files = expand_files(
            dir.path(),
            &["src".to_string(), "*.mod".to_string(), "src/*.go".to_string()],
        )
        .unwrap();

        assert_eq!(
            files,
            vec![
                PathBuf::from("go.mod"),
                PathBuf::from("src/main.go"),
                PathBuf::from("src/util/strings.go"),
            ]
        );
    }

    #[test]
    fn reports_whether_anything_matches() {
        let dir = assert_fs::TempDir::new().unwrap();
        dir.child("Dockerfile").touch().unwrap();
        assert!(matches_any(dir.path(), "Dockerfile").unwrap());
        assert!(!matches_any(dir.path(), "*.proto").unwrap());
    }

    #[test]
    fn invalid_patterns_are_errors() {
        let dir = assert_fs::TempDir::new().unwrap();
        assert_matches!(
            matches_any(dir.path(), "[z-a"),
            Err(PathError::InvalidPattern { .. })
        );
    }
}
