use std::io;

use thiserror::Error;

use crate::process::Pid;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Failed to open process {pid}: {source}")]
    ProcessOpenFailed {
        pid: Pid,
        #[source]
        source: io::Error,
    },

    #[error("Main module not found for process {0}")]
    ModuleNotFound(Pid),

    #[error("Failed to read process memory at address {address:#x}: {source}")]
    MemoryReadFailed {
        address: usize,
        #[source]
        source: io::Error,
    },

    #[error("Invalid offset {name}: {value:?}")]
    InvalidOffset { name: String, value: String },

    #[error("Unknown named offset: {0}")]
    UnknownOffset(String),

    #[error("Not attached to target process: {0}")]
    NotAttached(#[source] Box<Error>),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Io(e) => e.kind() == io::ErrorKind::NotFound,
            Error::NotAttached(inner) => inner.is_not_found(),
            _ => false,
        }
    }

    /// True for every failure that leaves a context without an attachment.
    pub fn is_not_attached(&self) -> bool {
        matches!(self, Error::NotAttached(_))
    }
}
