//! Error type shared by every registry operation.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Which endpoint of a crossnet record failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Source,
    Destination,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Source => f.write_str("source"),
            Endpoint::Destination => f.write_str("destination"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    /// A record is shorter than a configured column index.
    #[error("{}:{line}: column {index} out of range (row has {columns} columns)", path.display())]
    MalformedRow {
        path: PathBuf,
        line: usize,
        index: usize,
        columns: usize,
    },

    /// A native key has no mambo id in the loaded mode table.
    #[error("{}:{line}: {side} key `{key}` has no mambo id", path.display())]
    UnresolvedReference {
        path: PathBuf,
        line: usize,
        side: Endpoint,
        key: String,
    },

    /// An explicit counter start would collide with ids already on disk.
    #[error(
        "mambo id counter start {start} must be greater than {existing_max}, the largest id in {}",
        path.display()
    )]
    IdCounterConflict {
        start: u64,
        existing_max: u64,
        path: PathBuf,
    },

    #[error("file not found: {}", path.display())]
    FileMissing { path: PathBuf },

    #[error("cannot access {}: {source}", path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The id column of a registry, mapping or mode table is not an integer.
    #[error("{}:{line}: `{value}` is not a valid id", path.display())]
    InvalidId {
        path: PathBuf,
        line: usize,
        value: String,
    },

    #[error("unknown key transform `{name}`")]
    InvalidTransform { name: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RegistryError {
    /// Attach a path to an I/O failure, splitting out missing files.
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            RegistryError::FileMissing {
                path: path.to_path_buf(),
            }
        } else {
            RegistryError::FileUnreadable {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
