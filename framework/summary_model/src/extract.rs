use std::path::{Path, PathBuf};

use crate::MetricsRecord;

/// File name suffix of the result file written by the load generator.
pub const RESULT_FILE_SUFFIX: &str = ".json";

/// How to choose between several result files in the same directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    /// Take the first candidate by file name and log a warning if there are others.
    #[default]
    FirstMatch,
    /// Refuse to pick when there is more than one candidate.
    ExactlyOne,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("no result file ending in '{suffix}' found in '{}'", dir.display())]
    NotFound { dir: PathBuf, suffix: String },
    #[error("expected a single result file in '{}' but found {}", dir.display(), candidates.len())]
    Ambiguous {
        dir: PathBuf,
        candidates: Vec<PathBuf>,
    },
    #[error("failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("'{}' has an invalid value for '{field}'", path.display())]
    Invalid { path: PathBuf, field: &'static str },
}

/// Locates and parses the result file that the load generator leaves in a directory.
#[derive(Debug, Clone)]
pub struct ResultExtractor {
    suffix: String,
    policy: SelectionPolicy,
}

impl Default for ResultExtractor {
    fn default() -> Self {
        Self {
            suffix: RESULT_FILE_SUFFIX.to_string(),
            policy: SelectionPolicy::default(),
        }
    }
}

impl ResultExtractor {
    pub fn new(suffix: impl Into<String>, policy: SelectionPolicy) -> Self {
        Self {
            suffix: suffix.into(),
            policy,
        }
    }

    pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Find the result file in `dir`, without descending into sub-directories, and parse it.
    pub fn extract(&self, dir: &Path) -> Result<MetricsRecord, ExtractError> {
        let path = self.select(dir)?;
        log::debug!("Reading result file '{}'", path.display());

        let data = std::fs::read(&path).map_err(|source| ExtractError::Read {
            path: path.clone(),
            source,
        })?;
        let record: MetricsRecord =
            serde_json::from_slice(&data).map_err(|source| ExtractError::Parse {
                path: path.clone(),
                source,
            })?;

        if let Some(field) = record.invalid_throughput_field() {
            return Err(ExtractError::Invalid { path, field });
        }

        Ok(record)
    }

    fn select(&self, dir: &Path) -> Result<PathBuf, ExtractError> {
        let entries = std::fs::read_dir(dir).map_err(|source| ExtractError::Read {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ExtractError::Read {
                path: dir.to_path_buf(),
                source,
            })?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if is_file && entry.file_name().to_string_lossy().ends_with(&self.suffix) {
                candidates.push(entry.path());
            }
        }
        // Directory order is platform dependent.
        candidates.sort();

        match (candidates.len(), self.policy) {
            (0, _) => Err(ExtractError::NotFound {
                dir: dir.to_path_buf(),
                suffix: self.suffix.clone(),
            }),
            (1, _) => Ok(candidates.remove(0)),
            (_, SelectionPolicy::ExactlyOne) => Err(ExtractError::Ambiguous {
                dir: dir.to_path_buf(),
                candidates,
            }),
            (n, SelectionPolicy::FirstMatch) => {
                log::warn!(
                    "Found {n} result files in '{}', using '{}'",
                    dir.display(),
                    candidates[0].display()
                );
                Ok(candidates.remove(0))
            }
        }
    }
}

/// Parse the single result file in `dir` using the default suffix and [SelectionPolicy::FirstMatch].
pub fn extract_metrics(dir: &Path) -> Result<MetricsRecord, ExtractError> {
    ResultExtractor::default().extract(dir)
}
