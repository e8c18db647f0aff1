use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("source directory {0:?} does not exist")]
    MissingSourceDir(PathBuf),

    #[error("bundle {0:?} is not executable")]
    NotExecutable(PathBuf),

    #[error("failed to extract {bundle:?}: {reason}")]
    Extract { bundle: PathBuf, reason: String },

    #[error("extracting {bundle:?} timed out after {secs}s")]
    ExtractTimeout { bundle: PathBuf, secs: u64 },

    #[error("{path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("refresh command failed: {0}")]
    Refresh(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
