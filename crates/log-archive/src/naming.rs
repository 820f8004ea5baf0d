use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::format::ArchiveFormat;
use crate::group::LogGroup;

/// Token used in place of a relative path for the source root itself.
pub const ROOT_TOKEN: &str = "root";

/// Second-granularity, lexicographically sortable: `YYYYMMDDHHMMSS`.
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Where a job's output lands. One variant per archive format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutput {
    /// A single gzip-compressed tar of every file in the group.
    TarGz(PathBuf),
    /// A single zip of every file in the group.
    Zip(PathBuf),
    /// One `.gz` per input file, index-aligned with `ArchiveJob::files`.
    Gz(Vec<PathBuf>),
}

/// Everything a writer needs to produce one group's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveJob {
    /// Relative-path token of the group, used in status events.
    pub label: String,
    pub source_dir: PathBuf,
    pub files: Vec<String>,
    pub output: JobOutput,
}

impl ArchiveJob {
    pub fn format(&self) -> ArchiveFormat {
        match self.output {
            JobOutput::TarGz(_) => ArchiveFormat::TarGz,
            JobOutput::Zip(_) => ArchiveFormat::Zip,
            JobOutput::Gz(_) => ArchiveFormat::Gz,
        }
    }
}

/// Flatten `dir` relative to `root` into a single name token.
///
/// `root/api/v1` becomes `api_v1`; `root` itself becomes [`ROOT_TOKEN`].
pub fn relpath_token(root: &Path, dir: &Path) -> String {
    let relative = match dir.strip_prefix(root) {
        Ok(rel) => rel,
        Err(_) => {
            // Not under the root; fall back to the directory's own name.
            return dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| ROOT_TOKEN.to_owned());
        }
    };

    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    if parts.is_empty() {
        ROOT_TOKEN.to_owned()
    } else {
        parts.join("_")
    }
}

pub fn timestamp_token(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// `logs_<token>_<timestamp>.<ext>`
pub fn archive_name(token: &str, timestamp: &str, format: ArchiveFormat) -> String {
    format!("logs_{token}_{timestamp}.{}", format.extension())
}

/// `<token>_<file>.gz`
pub fn per_file_name(token: &str, file: &str) -> String {
    format!("{token}_{file}.gz")
}

/// Hands out archive names for one run.
///
/// Distinct directories can flatten to the same token (`a_b` and `a/b`, or a
/// subdirectory literally called `root`), and per-file names can meet even
/// when tokens differ (`a` holding `b_c.log` and `a/b` holding `c.log`). The
/// namer remembers every token and every output file name it has issued and
/// suffixes repeats with `-2`, `-3`, ... so names never collide within a run.
/// Collisions with archives left by an earlier run are not resolved here;
/// writers refuse to overwrite.
#[derive(Debug)]
pub struct ArchiveNamer {
    root: PathBuf,
    dest_dir: PathBuf,
    tokens: HashSet<String>,
    outputs: HashSet<String>,
}

impl ArchiveNamer {
    pub fn new(root: impl Into<PathBuf>, dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dest_dir: dest_dir.into(),
            tokens: HashSet::new(),
            outputs: HashSet::new(),
        }
    }

    /// Unique token for `dir` within this run.
    pub fn token_for(&mut self, dir: &Path) -> String {
        let base = relpath_token(&self.root, dir);
        let mut token = base.clone();
        let mut n = 1;
        while self.tokens.contains(&token) {
            n += 1;
            token = format!("{base}-{n}");
        }
        self.tokens.insert(token.clone());
        token
    }

    /// Claim `name` in the destination, or `<stem>-<n>.<ext>` if it is taken.
    fn claim(&mut self, name: String, ext: &str) -> PathBuf {
        let stem = name
            .strip_suffix(ext)
            .and_then(|s| s.strip_suffix('.'))
            .unwrap_or(&name)
            .to_owned();
        let mut candidate = name;
        let mut n = 1;
        while self.outputs.contains(&candidate) {
            n += 1;
            candidate = format!("{stem}-{n}.{ext}");
        }
        let path = self.dest_dir.join(&candidate);
        self.outputs.insert(candidate);
        path
    }

    /// Resolve output paths for a group. `at` should be captured once per group.
    pub fn plan(
        &mut self,
        group: LogGroup,
        format: ArchiveFormat,
        at: DateTime<Utc>,
    ) -> ArchiveJob {
        let label = self.token_for(&group.dir);

        let single = archive_name(&label, &timestamp_token(at), format);
        let output = match format {
            ArchiveFormat::TarGz => JobOutput::TarGz(self.claim(single, format.extension())),
            ArchiveFormat::Zip => JobOutput::Zip(self.claim(single, format.extension())),
            ArchiveFormat::Gz => JobOutput::Gz(
                group
                    .files
                    .iter()
                    .map(|file| self.claim(per_file_name(&label, file), format.extension()))
                    .collect(),
            ),
        };

        ArchiveJob {
            label,
            source_dir: group.dir,
            files: group.files,
            output,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap()
    }

    fn group(dir: &str, files: &[&str]) -> LogGroup {
        LogGroup {
            dir: PathBuf::from(dir),
            files: files.iter().map(|f| (*f).to_owned()).collect(),
        }
    }

    #[test]
    fn root_maps_to_root_token() {
        assert_eq!(relpath_token(Path::new("/logs"), Path::new("/logs")), "root");
    }

    #[test]
    fn nested_paths_flatten_with_underscores() {
        let root = Path::new("/logs");
        assert_eq!(relpath_token(root, Path::new("/logs/api")), "api");
        assert_eq!(relpath_token(root, Path::new("/logs/api/v1/eu")), "api_v1_eu");
    }

    #[test]
    fn timestamp_is_zero_padded_and_sortable() {
        assert_eq!(timestamp_token(at()), "20240309070501");
        let later = Utc.with_ymd_and_hms(2024, 11, 10, 0, 0, 0).unwrap();
        assert!(timestamp_token(later) > timestamp_token(at()));
    }

    #[test]
    fn aggregate_names_carry_token_timestamp_and_extension() {
        assert_eq!(
            archive_name("api_v1", "20240309070501", ArchiveFormat::TarGz),
            "logs_api_v1_20240309070501.tar.gz"
        );
        assert_eq!(
            archive_name("root", "20240309070501", ArchiveFormat::Zip),
            "logs_root_20240309070501.zip"
        );
    }

    #[test]
    fn per_file_names_have_no_timestamp() {
        assert_eq!(per_file_name("sub", "c.log"), "sub_c.log.gz");
    }

    #[test]
    fn plan_single_archive() {
        let mut namer = ArchiveNamer::new("/logs", "/out");
        let job = namer.plan(group("/logs/api", &["a.log"]), ArchiveFormat::Zip, at());

        assert_eq!(job.label, "api");
        assert_eq!(job.format(), ArchiveFormat::Zip);
        assert_eq!(job.source_dir, PathBuf::from("/logs/api"));
        assert_eq!(
            job.output,
            JobOutput::Zip(PathBuf::from("/out/logs_api_20240309070501.zip"))
        );
    }

    #[test]
    fn plan_per_file_outputs_align_with_files() {
        let mut namer = ArchiveNamer::new("/logs", "/out");
        let job = namer.plan(group("/logs", &["a.log", "b.log"]), ArchiveFormat::Gz, at());

        assert_eq!(
            job.output,
            JobOutput::Gz(vec![
                PathBuf::from("/out/root_a.log.gz"),
                PathBuf::from("/out/root_b.log.gz"),
            ])
        );
    }

    #[test]
    fn colliding_tokens_are_disambiguated() {
        let mut namer = ArchiveNamer::new("/logs", "/out");
        assert_eq!(namer.token_for(Path::new("/logs/a_b")), "a_b");
        assert_eq!(namer.token_for(Path::new("/logs/a/b")), "a_b-2");
        assert_eq!(namer.token_for(Path::new("/logs")), "root");
        assert_eq!(namer.token_for(Path::new("/logs/root")), "root-2");
    }

    #[test]
    fn colliding_per_file_names_are_disambiguated() {
        let mut namer = ArchiveNamer::new("/logs", "/out");
        let first = namer.plan(group("/logs/a", &["b_c.log"]), ArchiveFormat::Gz, at());
        let second = namer.plan(group("/logs/a/b", &["c.log"]), ArchiveFormat::Gz, at());

        assert_eq!(first.output, JobOutput::Gz(vec![PathBuf::from("/out/a_b_c.log.gz")]));
        assert_eq!(
            second.output,
            JobOutput::Gz(vec![PathBuf::from("/out/a_b_c.log-2.gz")])
        );
    }

    #[test]
    fn names_are_distinct_across_nested_groups() {
        let mut namer = ArchiveNamer::new("/logs", "/out");
        let dirs = ["/logs", "/logs/a", "/logs/a/b", "/logs/a/b/c"];
        let names: std::collections::HashSet<PathBuf> = dirs
            .iter()
            .map(|d| match namer.plan(group(d, &["x.log"]), ArchiveFormat::TarGz, at()).output {
                JobOutput::TarGz(path) => path,
                other => panic!("expected a tar.gz archive, got {other:?}"),
            })
            .collect();
        assert_eq!(names.len(), dirs.len());
    }
}
