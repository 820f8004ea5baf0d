use std::fmt;

use crate::format::ArchiveFormat;

/// Totals for one completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Groups for which at least one archive was written.
    pub groups_archived: usize,
    /// Log files that ended up in an archive.
    pub files_archived: usize,
    /// Failed units of work (whole groups, or single files for `gz`).
    pub failures: usize,
}

/// Progress reported by the engine while a run is underway.
///
/// Callers decide how to present these: the CLI renders a spinner, tests
/// collect them, library consumers can log or ignore them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// Discovery of the source tree has started.
    Scanning,
    /// A group is being compressed.
    Compressing { group: String, format: ArchiveFormat },
    /// A group produced archives containing `file_count` log files.
    Succeeded { group: String, file_count: usize },
    /// A unit of work failed; the run continues with the next one.
    Failed { group: String, cause: String },
    /// A run was triggered while another was still going and was skipped.
    RunInProgress,
    /// The run was cancelled before it finished.
    Cancelled,
    /// The run stopped on an error that affects the whole tree.
    Aborted { cause: String },
    /// The run finished, whatever the outcome of individual groups.
    AllDone { summary: RunSummary },
}

impl StatusEvent {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Label of the group this event concerns, if any.
    pub fn group(&self) -> Option<&str> {
        match self {
            Self::Compressing { group, .. }
            | Self::Succeeded { group, .. }
            | Self::Failed { group, .. } => Some(group),
            _ => None,
        }
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scanning => write!(f, "Scanning for .log files..."),
            Self::Compressing { group, format } => {
                write!(f, "Compressing {group} logs to {format}...")
            }
            Self::Succeeded { group, file_count } => {
                write!(f, "Archived {file_count} logs from: {group}")
            }
            Self::Failed { group, cause } => write!(f, "Failed to archive {group}: {cause}"),
            Self::RunInProgress => write!(f, "Previous run still in progress, skipping"),
            Self::Cancelled => write!(f, "Run cancelled"),
            Self::Aborted { cause } => write!(f, "Run aborted: {cause}"),
            Self::AllDone { summary } => write!(
                f,
                "All log folders processed ({} groups, {} files, {} failed)",
                summary.groups_archived, summary.files_archived, summary.failures
            ),
        }
    }
}

/// Receives status events as they happen.
pub trait StatusSink: Send + Sync {
    fn emit(&self, event: StatusEvent);
}

impl<T: StatusSink + ?Sized> StatusSink for std::sync::Arc<T> {
    fn emit(&self, event: StatusEvent) {
        (**self).emit(event)
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StatusSink for NullSink {
    fn emit(&self, _event: StatusEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingSink;

    #[test]
    fn display_messages() {
        assert_eq!(StatusEvent::Scanning.to_string(), "Scanning for .log files...");
        assert_eq!(
            StatusEvent::Compressing {
                group: "api".into(),
                format: ArchiveFormat::TarGz
            }
            .to_string(),
            "Compressing api logs to tar.gz..."
        );
        assert_eq!(
            StatusEvent::Succeeded {
                group: "root".into(),
                file_count: 3
            }
            .to_string(),
            "Archived 3 logs from: root"
        );
        assert_eq!(
            StatusEvent::AllDone {
                summary: RunSummary {
                    groups_archived: 2,
                    files_archived: 5,
                    failures: 1
                }
            }
            .to_string(),
            "All log folders processed (2 groups, 5 files, 1 failed)"
        );
    }

    #[test]
    fn group_label_accessor() {
        let failed = StatusEvent::Failed {
            group: "sub".into(),
            cause: "disk full".into(),
        };
        assert!(failed.is_failure());
        assert_eq!(failed.group(), Some("sub"));
        assert_eq!(StatusEvent::Scanning.group(), None);
    }

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.emit(StatusEvent::Scanning);
        sink.emit(StatusEvent::Failed {
            group: "a".into(),
            cause: "x".into(),
        });
        sink.emit(StatusEvent::AllDone {
            summary: RunSummary::default(),
        });

        let events = sink.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], StatusEvent::Scanning);
        assert_eq!(sink.failures().len(), 1);
    }
}
