use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Returned when a format name does not match any supported archive format.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported archive format: {0:?} (expected tar.gz, zip or gz)")]
pub struct UnsupportedFormatError(pub String);

/// How a group of log files is compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ArchiveFormat {
    /// One gzip-compressed tar stream per directory.
    TarGz,
    /// One zip file per directory, entries at the top level.
    Zip,
    /// One `.gz` file per log file.
    Gz,
}

impl ArchiveFormat {
    /// Canonical file extension, without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::TarGz => "tar.gz",
            Self::Zip => "zip",
            Self::Gz => "gz",
        }
    }

    /// True when every log file becomes its own archive.
    pub fn is_per_file(&self) -> bool {
        matches!(self, Self::Gz)
    }

    pub fn all() -> [ArchiveFormat; 3] {
        [Self::TarGz, Self::Zip, Self::Gz]
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ArchiveFormat {
    type Err = UnsupportedFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // A single leading dot is tolerated so `.zip` and `zip` mean the same.
        let name = s.strip_prefix('.').unwrap_or(s);
        match name {
            "tar.gz" => Ok(Self::TarGz),
            "zip" => Ok(Self::Zip),
            "gz" => Ok(Self::Gz),
            _ => Err(UnsupportedFormatError(s.to_owned())),
        }
    }
}

impl TryFrom<String> for ArchiveFormat {
    type Error = UnsupportedFormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ArchiveFormat> for String {
    fn from(format: ArchiveFormat) -> Self {
        format.extension().to_owned()
    }
}
