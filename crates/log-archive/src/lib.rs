pub mod clock;
pub mod event;
pub mod format;
pub mod group;
pub mod naming;
pub mod options;
pub mod run;
pub mod walk;
pub mod writer;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, SystemClock};
pub use event::{NullSink, RunSummary, StatusEvent, StatusSink};
pub use format::{ArchiveFormat, UnsupportedFormatError};
pub use group::{GroupError, LOG_SUFFIX, LogGroup, collect_group};
pub use naming::{ArchiveJob, ArchiveNamer, JobOutput};
pub use options::RunOptions;
pub use run::{Orchestrator, RunError, RunOutcome, RunState};
pub use walk::{SourceTree, WalkError, walk_tree};
pub use writer::{ArchiveWriteError, WriteReport, write_archive};

/// Token used to cancel a run in progress.
pub use tokio_util::sync::CancellationToken;
