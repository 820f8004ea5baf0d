use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Errors that can occur while discovering the directory tree.
#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    #[error("source directory does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read directory {}: {source}", path.display())]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The root directory and every directory beneath it, as seen at scan time.
#[derive(Debug, Clone)]
pub struct SourceTree {
    // Invariant: non-empty, root first, parents before their children.
    directories: Vec<PathBuf>,
}

impl SourceTree {
    pub fn root(&self) -> &Path {
        &self.directories[0]
    }

    /// All directories, root first. Within one branch a parent always comes
    /// before its descendants; nothing else about the order is promised.
    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }
}

/// Enumerate `root` and all of its descendant directories.
///
/// Symbolic links are never followed, so a link to a directory is neither
/// walked nor returned. Any directory that cannot be read aborts the walk.
pub fn walk_tree(root: &Path) -> Result<SourceTree, WalkError> {
    if !root.is_dir() {
        return Err(WalkError::NotFound(root.to_path_buf()));
    }

    let mut directories = Vec::new();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            WalkError::DirectoryRead {
                path,
                source: e.into(),
            }
        })?;

        if entry.file_type().is_dir() {
            directories.push(entry.into_path());
        }
    }

    tracing::debug!(
        root = %root.display(),
        directories = directories.len(),
        "walked source tree"
    );

    Ok(SourceTree { directories })
}
