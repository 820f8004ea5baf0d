use std::path::{Path, PathBuf};

use crate::format::ArchiveFormat;

/// Fully resolved inputs for one run. Built once by the caller and never
/// mutated while a run is in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    source_dir: PathBuf,
    dest_dir: PathBuf,
    format: ArchiveFormat,
    schedule: Option<String>,
}

impl RunOptions {
    pub fn new(
        source_dir: impl Into<PathBuf>,
        dest_dir: impl Into<PathBuf>,
        format: ArchiveFormat,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            dest_dir: dest_dir.into(),
            format,
            schedule: None,
        }
    }

    /// Attach a schedule expression. The engine never interprets it; it is
    /// carried for the trigger that drives repeated runs.
    pub fn with_schedule(mut self, schedule: impl Into<String>) -> Self {
        self.schedule = Some(schedule.into());
        self
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn dest_dir(&self) -> &Path {
        &self.dest_dir
    }

    pub fn format(&self) -> ArchiveFormat {
        self.format
    }

    pub fn schedule(&self) -> Option<&str> {
        self.schedule.as_deref()
    }
}
