use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::naming::{ArchiveJob, JobOutput};

/// Errors that can occur while producing an archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveWriteError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("refusing to overwrite existing archive {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("zip error on {}: {source}", path.display())]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("archive write cancelled")]
    Cancelled,
}

impl ArchiveWriteError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// What happened while writing one job.
#[derive(Debug, Default)]
pub struct WriteReport {
    /// Archives moved into place.
    pub written: Vec<PathBuf>,
    /// Number of source log files that ended up in an archive.
    pub archived_files: usize,
    pub failures: Vec<ArchiveWriteError>,
}

impl WriteReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn was_cancelled(&self) -> bool {
        self.failures.iter().any(ArchiveWriteError::is_cancelled)
    }
}

/// Produce the output for one job.
///
/// `tar.gz` and `zip` treat the group as one unit: either the archive appears
/// with every file in it, or nothing appears and a single failure is
/// reported. `gz` treats each file as its own unit and keeps going after a
/// failure.
///
/// Output is staged in a temporary file beside the destination and moved into
/// place only once complete. Existing files are never overwritten.
pub fn write_archive(job: &ArchiveJob, cancel: &CancellationToken) -> WriteReport {
    let mut report = WriteReport::default();

    match &job.output {
        JobOutput::TarGz(out) => {
            record(&mut report, out, job.files.len(), write_tar_gz(job, out, cancel));
        }
        JobOutput::Zip(out) => {
            record(&mut report, out, job.files.len(), write_zip(job, out, cancel));
        }
        JobOutput::Gz(outs) => {
            for (name, out) in job.files.iter().zip(outs) {
                if cancel.is_cancelled() {
                    report.failures.push(ArchiveWriteError::Cancelled);
                    break;
                }
                let src = job.source_dir.join(name);
                record(&mut report, out, 1, write_gz(&src, out, cancel));
            }
        }
    }

    report
}

fn record(
    report: &mut WriteReport,
    out: &Path,
    files: usize,
    result: Result<(), ArchiveWriteError>,
) {
    match result {
        Ok(()) => {
            tracing::debug!(archive = %out.display(), files, "archive written");
            report.written.push(out.to_path_buf());
            report.archived_files += files;
        }
        Err(e) => {
            tracing::debug!(archive = %out.display(), error = %e, "archive failed");
            report.failures.push(e);
        }
    }
}

fn write_tar_gz(
    job: &ArchiveJob,
    out: &Path,
    cancel: &CancellationToken,
) -> Result<(), ArchiveWriteError> {
    let mut staged = stage(out)?;
    {
        let encoder =
            GzEncoder::new(BufWriter::new(staged.as_file_mut()), Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for name in &job.files {
            let src = job.source_dir.join(name);
            let file = File::open(&src).map_err(io_error(&src))?;
            let meta = file.metadata().map_err(io_error(&src))?;

            let mut header = tar::Header::new_gnu();
            header.set_metadata(&meta);
            // Active logs may grow while being read; the entry is cut at the
            // size recorded in the header.
            let data = Cancellable::new(file.take(meta.len()), cancel);
            builder
                .append_data(&mut header, name, data)
                .map_err(|e| classify(e, &src, cancel))?;
        }

        let encoder = builder.into_inner().map_err(io_error(out))?;
        encoder
            .finish()
            .map_err(io_error(out))?
            .flush()
            .map_err(io_error(out))?;
    }
    publish(staged, out)
}

fn write_zip(
    job: &ArchiveJob,
    out: &Path,
    cancel: &CancellationToken,
) -> Result<(), ArchiveWriteError> {
    let zip_error = |source| ArchiveWriteError::Zip {
        path: out.to_path_buf(),
        source,
    };

    let mut staged = stage(out)?;
    {
        let mut zip = ZipWriter::new(BufWriter::new(staged.as_file_mut()));

        for name in &job.files {
            let src = job.source_dir.join(name);
            let file = File::open(&src).map_err(io_error(&src))?;
            let len = file.metadata().map_err(io_error(&src))?.len();

            let options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .large_file(len >= u64::from(u32::MAX));
            zip.start_file(name.as_str(), options).map_err(zip_error)?;

            let mut data = Cancellable::new(file, cancel);
            io::copy(&mut data, &mut zip).map_err(|e| classify(e, &src, cancel))?;
        }

        zip.finish()
            .map_err(zip_error)?
            .flush()
            .map_err(io_error(out))?;
    }
    publish(staged, out)
}

fn write_gz(src: &Path, out: &Path, cancel: &CancellationToken) -> Result<(), ArchiveWriteError> {
    let file = File::open(src).map_err(io_error(src))?;

    let mut staged = stage(out)?;
    {
        let mut encoder =
            GzEncoder::new(BufWriter::new(staged.as_file_mut()), Compression::default());
        let mut data = Cancellable::new(file, cancel);
        io::copy(&mut data, &mut encoder).map_err(|e| classify(e, src, cancel))?;
        encoder
            .finish()
            .map_err(io_error(out))?
            .flush()
            .map_err(io_error(out))?;
    }
    publish(staged, out)
}

/// Create a hidden temporary file next to `out`. It is removed on drop
/// unless published.
fn stage(out: &Path) -> Result<NamedTempFile, ArchiveWriteError> {
    let dir = out.parent().unwrap_or(Path::new("."));
    tempfile::Builder::new()
        .prefix(".log-archive-")
        .suffix(".partial")
        .tempfile_in(dir)
        .map_err(io_error(out))
}

fn publish(staged: NamedTempFile, out: &Path) -> Result<(), ArchiveWriteError> {
    staged.persist_noclobber(out).map_err(|e| {
        if e.error.kind() == io::ErrorKind::AlreadyExists {
            ArchiveWriteError::AlreadyExists(out.to_path_buf())
        } else {
            ArchiveWriteError::Io {
                path: out.to_path_buf(),
                source: e.error,
            }
        }
    })?;
    Ok(())
}

fn io_error(path: &Path) -> impl Fn(io::Error) -> ArchiveWriteError + '_ {
    move |source| ArchiveWriteError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Read errors caused by cancellation surface as `Cancelled`, not I/O.
fn classify(e: io::Error, path: &Path, cancel: &CancellationToken) -> ArchiveWriteError {
    if cancel.is_cancelled() {
        ArchiveWriteError::Cancelled
    } else {
        io_error(path)(e)
    }
}

/// Reader that stops with an error as soon as the token is cancelled.
struct Cancellable<'a, R> {
    inner: R,
    cancel: &'a CancellationToken,
}

impl<'a, R> Cancellable<'a, R> {
    fn new(inner: R, cancel: &'a CancellationToken) -> Self {
        Self { inner, cancel }
    }
}

impl<R: Read> Read for Cancellable<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(io::Error::other("cancelled"));
        }
        self.inner.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use flate2::read::GzDecoder;

    use super::*;

    fn fixture(files: &[(&str, &str)]) -> (tempfile::TempDir, tempfile::TempDir) {
        let src = tempfile::tempdir().unwrap();
        for (name, content) in files {
            fs::write(src.path().join(name), content).unwrap();
        }
        (src, tempfile::tempdir().unwrap())
    }

    fn job(src: &Path, files: &[&str], output: JobOutput) -> ArchiveJob {
        ArchiveJob {
            label: "root".into(),
            source_dir: src.to_path_buf(),
            files: files.iter().map(|f| (*f).to_owned()).collect(),
            output,
        }
    }

    fn leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".partial"))
            .collect()
    }

    #[test]
    fn tar_gz_contains_exactly_the_group_files() {
        let (src, dest) = fixture(&[("a.log", "alpha\n"), ("b.log", "beta\n")]);
        let out = dest.path().join("logs_root.tar.gz");

        let report = write_archive(
            &job(src.path(), &["a.log", "b.log"], JobOutput::TarGz(out.clone())),
            &CancellationToken::new(),
        );
        assert!(report.is_success(), "{:?}", report.failures);
        assert_eq!(report.archived_files, 2);
        assert_eq!(report.written, vec![out.clone()]);

        let mut archive = tar::Archive::new(GzDecoder::new(File::open(&out).unwrap()));
        let mut entries: Vec<(String, String)> = archive
            .entries()
            .unwrap()
            .map(|e| {
                let mut e = e.unwrap();
                let path = e.path().unwrap().to_string_lossy().into_owned();
                let mut body = String::new();
                e.read_to_string(&mut body).unwrap();
                (path, body)
            })
            .collect();
        entries.sort();
        assert_eq!(
            entries,
            vec![
                ("a.log".to_owned(), "alpha\n".to_owned()),
                ("b.log".to_owned(), "beta\n".to_owned()),
            ]
        );
    }

    #[test]
    fn zip_entries_are_top_level() {
        let (src, dest) = fixture(&[("a.log", "alpha"), ("b.log", "beta")]);
        let out = dest.path().join("logs_root.zip");

        let report = write_archive(
            &job(src.path(), &["a.log", "b.log"], JobOutput::Zip(out.clone())),
            &CancellationToken::new(),
        );
        assert!(report.is_success(), "{:?}", report.failures);

        let mut archive = zip::ZipArchive::new(File::open(&out).unwrap()).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort();
        assert_eq!(names, vec!["a.log", "b.log"]);

        let mut body = String::new();
        archive.by_name("b.log").unwrap().read_to_string(&mut body).unwrap();
        assert_eq!(body, "beta");
    }

    #[test]
    fn gz_writes_one_file_per_log() {
        let (src, dest) = fixture(&[("a.log", "alpha"), ("b.log", "beta")]);
        let outs = vec![
            dest.path().join("root_a.log.gz"),
            dest.path().join("root_b.log.gz"),
        ];

        let report = write_archive(
            &job(src.path(), &["a.log", "b.log"], JobOutput::Gz(outs.clone())),
            &CancellationToken::new(),
        );
        assert!(report.is_success(), "{:?}", report.failures);
        assert_eq!(report.archived_files, 2);

        let mut body = String::new();
        GzDecoder::new(File::open(&outs[1]).unwrap())
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "beta");
    }

    #[test]
    fn gz_failure_does_not_block_other_files() {
        let (src, dest) = fixture(&[("a.log", "alpha"), ("c.log", "gamma")]);
        let outs = vec![
            dest.path().join("root_a.log.gz"),
            dest.path().join("root_b.log.gz"),
            dest.path().join("root_c.log.gz"),
        ];

        // b.log is listed but missing on disk.
        let report = write_archive(
            &job(src.path(), &["a.log", "b.log", "c.log"], JobOutput::Gz(outs.clone())),
            &CancellationToken::new(),
        );
        assert_eq!(report.archived_files, 2);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            &report.failures[0],
            ArchiveWriteError::Io { path, .. } if path.ends_with("b.log")
        ));
        assert!(outs[0].exists());
        assert!(!outs[1].exists());
        assert!(outs[2].exists());
    }

    #[test]
    fn missing_member_fails_whole_tar_without_residue() {
        let (src, dest) = fixture(&[("a.log", "alpha")]);
        let out = dest.path().join("logs_root.tar.gz");

        let report = write_archive(
            &job(src.path(), &["a.log", "gone.log"], JobOutput::TarGz(out.clone())),
            &CancellationToken::new(),
        );
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.archived_files, 0);
        assert!(!out.exists());
        assert!(leftovers(dest.path()).is_empty());
    }

    #[test]
    fn never_overwrites_an_existing_archive() {
        let (src, dest) = fixture(&[("a.log", "alpha")]);
        let out = dest.path().join("logs_root.zip");
        fs::write(&out, "previous run").unwrap();

        let report = write_archive(
            &job(src.path(), &["a.log"], JobOutput::Zip(out.clone())),
            &CancellationToken::new(),
        );
        assert!(matches!(
            &report.failures[..],
            [ArchiveWriteError::AlreadyExists(p)] if *p == out
        ));
        assert_eq!(fs::read_to_string(&out).unwrap(), "previous run");
        assert!(leftovers(dest.path()).is_empty());
    }

    #[test]
    fn cancelled_token_stops_before_writing() {
        let (src, dest) = fixture(&[("a.log", "alpha"), ("b.log", "beta")]);
        let outs = vec![
            dest.path().join("root_a.log.gz"),
            dest.path().join("root_b.log.gz"),
        ];
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = write_archive(
            &job(src.path(), &["a.log", "b.log"], JobOutput::Gz(outs.clone())),
            &cancel,
        );
        assert!(report.was_cancelled());
        assert!(report.written.is_empty());
        assert!(!outs[0].exists());
    }

    #[test]
    fn cancelled_tar_reports_cancellation() {
        let (src, dest) = fixture(&[("a.log", "alpha")]);
        let out = dest.path().join("logs_root.tar.gz");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = write_archive(
            &job(src.path(), &["a.log"], JobOutput::TarGz(out.clone())),
            &cancel,
        );
        assert!(report.was_cancelled());
        assert!(!out.exists());
        assert!(leftovers(dest.path()).is_empty());
    }
}
