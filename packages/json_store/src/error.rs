use std::io;
use std::path::PathBuf;

use jsondb_core_store::{Error as CoreError, PathError};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Core(#[from] CoreError),

    #[error("Could not {operation} backing file {path:?}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not encode document: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Could not convert value for '{key}': {source}")]
    Value {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Value at '{key}' is a {found}, not a number")]
    NotANumber { key: String, found: &'static str },

    #[error("Value at '{key}' is a {found}, not a sequence")]
    NotASequence { key: String, found: &'static str },

    #[error("Could not write snapshot into {dir:?}: {source}")]
    Snapshot {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid store options: {source}")]
    Config {
        #[source]
        source: serde_json::Error,
    },
}

impl From<PathError> for Error {
    fn from(error: PathError) -> Self {
        Error::Core(CoreError::from(error))
    }
}

impl Error {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}
