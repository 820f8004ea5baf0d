use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log_archive::{ArchiveFormat, RunOptions};
use serde::{Deserialize, Serialize};

/// Config file picked up from the working directory, kept for compatibility
/// with existing setups.
pub const LEGACY_CONFIG_FILE: &str = ".logarchiverc.json";

/// Values that may come from a config file. Every field is optional; the
/// command line fills in or overrides whatever is set here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct FileConfig {
    pub directory: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub format: Option<ArchiveFormat>,
    pub schedule: Option<String>,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub directory: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub format: Option<String>,
    pub schedule: Option<String>,
}

/// Config file path: `~/.config/log-archive/config.toml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("log-archive").join("config.toml"))
}

/// Pick the config file to read, if any: the legacy JSON file in the working
/// directory first, then the per-user TOML file.
pub fn discover() -> Option<PathBuf> {
    let legacy = PathBuf::from(LEGACY_CONFIG_FILE);
    if legacy.is_file() {
        return Some(legacy);
    }
    config_path().filter(|p| p.is_file())
}

/// Parse a config file. `.json` files are read as JSON, anything else as TOML.
pub fn parse(path: &Path, contents: &str) -> Result<FileConfig> {
    let is_json = path.extension().is_some_and(|ext| ext == "json");
    let config: FileConfig = if is_json {
        serde_json::from_str(contents)?
    } else {
        toml::from_str(contents)?
    };
    Ok(config)
}

/// Load the config file named on the command line, or a discovered one.
///
/// No config file at all yields the defaults. A file that is found but cannot
/// be read or parsed is an error, whether it was named or discovered.
pub fn load_config(explicit: Option<&Path>) -> Result<FileConfig> {
    match explicit.map(Path::to_path_buf).or_else(discover) {
        Some(path) => load_file(&path),
        None => Ok(FileConfig::default()),
    }
}

fn load_file(path: &Path) -> Result<FileConfig> {
    tracing::debug!(path = %path.display(), "loading config file");
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    parse(path, &contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

/// Merge command line values over file values and validate the result.
///
/// The format is checked here, before any run starts. Relative paths are
/// made absolute against the working directory.
pub fn resolve(overrides: Overrides, file: FileConfig) -> Result<RunOptions> {
    let Some(directory) = overrides.directory.or(file.directory) else {
        bail!("no source directory given (use --directory or set `directory` in the config file)");
    };
    let Some(output) = overrides.output.or(file.output) else {
        bail!("no destination directory given (use --output or set `output` in the config file)");
    };

    let format = match overrides.format {
        Some(name) => name.parse::<ArchiveFormat>()?,
        None => file.format.unwrap_or(ArchiveFormat::TarGz),
    };

    let source = std::path::absolute(&directory)
        .with_context(|| format!("invalid source directory {}", directory.display()))?;
    let dest = std::path::absolute(&output)
        .with_context(|| format!("invalid destination directory {}", output.display()))?;

    let options = RunOptions::new(source, dest, format);
    Ok(match overrides.schedule.or(file.schedule) {
        Some(schedule) => options.with_schedule(schedule),
        None => options,
    })
}
