use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("Missing header line in {}", .0.display())]
    MissingHeader(PathBuf),
    #[error("Out of memory: {0}")]
    OutOfMemory(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Distributed run aborted: {0}")]
    Aborted(String),
    #[error("Participant failed: {0}")]
    ParticipantFailed(String),
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Binary Serialization error: {0}")]
    BinarySerialization(#[from] bincode::Error),
}

impl QueryError {
    /// Map an open/read failure on `path` to `FileNotFound` when the file is missing
    pub fn from_io(path: &std::path::Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound(path.to_path_buf())
        } else {
            Self::Io(err)
        }
    }
}

impl From<std::collections::TryReserveError> for QueryError {
    fn from(err: std::collections::TryReserveError) -> Self {
        Self::OutOfMemory(err.to_string())
    }
}
