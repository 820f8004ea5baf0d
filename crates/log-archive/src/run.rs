use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::event::{RunSummary, StatusEvent, StatusSink};
use crate::group::collect_group;
use crate::naming::{ArchiveNamer, relpath_token};
use crate::options::RunOptions;
use crate::walk::{WalkError, walk_tree};
use crate::writer::write_archive;

/// Errors that abort a whole run. Per-group failures never show up here;
/// they are reported as [`StatusEvent::Failed`] and the run carries on.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("source directory does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to create destination directory {}: {source}", path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Walk(WalkError),

    #[error("run cancelled")]
    Cancelled,
}

impl From<WalkError> for RunError {
    fn from(e: WalkError) -> Self {
        match e {
            WalkError::NotFound(path) => Self::NotFound(path),
            other => Self::Walk(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(RunSummary),
    /// Another run was already in progress; nothing was touched.
    Skipped,
}

/// Drives a run end to end and refuses to run twice at once.
///
/// One orchestrator should be shared by everything that can trigger runs
/// against the same destination, so that overlapping triggers are caught.
pub struct Orchestrator {
    running: AtomicBool,
    clock: Box<dyn Clock>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            running: AtomicBool::new(false),
            clock: Box::new(clock),
        }
    }

    pub fn state(&self) -> RunState {
        if self.running.load(Ordering::Acquire) {
            RunState::Running
        } else {
            RunState::Idle
        }
    }

    /// Archive every log group under the source directory once.
    ///
    /// Returns `Ok(RunOutcome::Skipped)` without doing any work if a run is
    /// already in progress on this orchestrator. Every run that starts ends
    /// with exactly one of `AllDone`, `Cancelled` or `Aborted`.
    pub fn run_once(
        &self,
        options: &RunOptions,
        sink: &dyn StatusSink,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, RunError> {
        let Some(_guard) = self.try_begin() else {
            warn!("run triggered while a previous run is still in progress");
            sink.emit(StatusEvent::RunInProgress);
            return Ok(RunOutcome::Skipped);
        };

        match self.archive_tree(options, sink, cancel) {
            Ok(summary) => Ok(RunOutcome::Completed(summary)),
            Err(RunError::Cancelled) => Err(RunError::Cancelled),
            Err(e) => {
                warn!(error = %e, "run aborted");
                sink.emit(StatusEvent::Aborted {
                    cause: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn try_begin(&self) -> Option<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(&self.running))
    }

    fn archive_tree(
        &self,
        options: &RunOptions,
        sink: &dyn StatusSink,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, RunError> {
        let source = options.source_dir();
        let dest = options.dest_dir();
        let format = options.format();

        sink.emit(StatusEvent::Scanning);
        info!(source = %source.display(), dest = %dest.display(), %format, "starting run");

        if !source.is_dir() {
            return Err(RunError::NotFound(source.to_path_buf()));
        }

        std::fs::create_dir_all(dest).map_err(|e| RunError::Destination {
            path: dest.to_path_buf(),
            source: e,
        })?;

        let tree = walk_tree(source)?;
        let mut namer = ArchiveNamer::new(tree.root(), dest);
        let mut summary = RunSummary::default();

        for dir in tree.directories() {
            if cancel.is_cancelled() {
                return Err(cancelled(sink));
            }

            let group = match collect_group(dir) {
                Ok(Some(group)) => group,
                Ok(None) => continue,
                Err(e) => {
                    let label = relpath_token(tree.root(), dir);
                    warn!(group = %label, error = %e, "could not list directory");
                    summary.failures += 1;
                    sink.emit(StatusEvent::Failed {
                        group: label,
                        cause: e.to_string(),
                    });
                    continue;
                }
            };

            let job = namer.plan(group, format, self.clock.now());
            sink.emit(StatusEvent::Compressing {
                group: job.label.clone(),
                format,
            });

            let report = write_archive(&job, cancel);
            if report.was_cancelled() {
                return Err(cancelled(sink));
            }

            if report.archived_files > 0 {
                summary.groups_archived += 1;
                summary.files_archived += report.archived_files;
                sink.emit(StatusEvent::Succeeded {
                    group: job.label.clone(),
                    file_count: report.archived_files,
                });
            }

            for failure in report.failures {
                warn!(group = %job.label, error = %failure, "archive failed");
                summary.failures += 1;
                sink.emit(StatusEvent::Failed {
                    group: job.label.clone(),
                    cause: failure.to_string(),
                });
            }
        }

        info!(
            groups = summary.groups_archived,
            files = summary.files_archived,
            failures = summary.failures,
            "run finished"
        );
        sink.emit(StatusEvent::AllDone { summary });
        Ok(summary)
    }
}

fn cancelled(sink: &dyn StatusSink) -> RunError {
    info!("run cancelled");
    sink.emit(StatusEvent::Cancelled);
    RunError::Cancelled
}

/// Returns the orchestrator to `Idle` when dropped, including on unwind.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
