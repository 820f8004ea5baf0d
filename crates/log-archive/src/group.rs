use std::path::{Path, PathBuf};

/// Suffix a file name must end with to be picked up. Case-sensitive.
pub const LOG_SUFFIX: &str = ".log";

/// Errors that can occur while listing a single directory.
#[derive(Debug, thiserror::Error)]
#[error("failed to list {}: {source}", path.display())]
pub struct GroupError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// A directory and the log files directly inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogGroup {
    pub dir: PathBuf,
    /// Bare file names, sorted. Never empty.
    pub files: Vec<String>,
}

/// True if a bare file name qualifies as a log file.
pub fn is_log_file_name(name: &str) -> bool {
    name.ends_with(LOG_SUFFIX)
}

/// Collect the log files that sit directly in `dir`.
///
/// Subdirectories are ignored. A symlink to a regular file counts as a file.
/// Returns `Ok(None)` when the directory holds no log files so that callers
/// never materialize an empty group.
pub fn collect_group(dir: &Path) -> Result<Option<LogGroup>, GroupError> {
    let wrap = |source| GroupError {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(wrap)? {
        let entry = entry.map_err(wrap)?;

        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            tracing::debug!(path = %entry.path().display(), "skipping non UTF-8 file name");
            continue;
        };
        if !is_log_file_name(&name) {
            continue;
        }

        // Follows symlinks; a dangling link simply does not qualify.
        let is_file = std::fs::metadata(entry.path())
            .map(|m| m.is_file())
            .unwrap_or(false);
        if is_file {
            files.push(name);
        }
    }

    if files.is_empty() {
        return Ok(None);
    }

    files.sort();
    Ok(Some(LogGroup {
        dir: dir.to_path_buf(),
        files,
    }))
}
