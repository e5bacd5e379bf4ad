//! Crate-wide error types.

use thiserror::Error;

use std::path::{Path, PathBuf};

pub type ProfResult<T> = Result<T, ProfError>;

#[derive(Debug, Error)]
pub enum ProfError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("environment error: {0}")]
    Environment(String),

    #[error("{command} failed:\n{output}")]
    Runner { command: String, output: String },

    #[error("failed to decode profile {}: {cause}", file.display())]
    Decode { file: PathBuf, cause: String },

    #[error("failed to {op} {}: {source}", path.display())]
    FileIo {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing artifact: {}", .0.display())]
    MissingArtifact(PathBuf),
}

impl ProfError {
    pub fn decode(file: &Path, cause: impl Into<String>) -> Self {
        Self::Decode {
            file: file.to_path_buf(),
            cause: cause.into(),
        }
    }
}

/// Attaches the failing operation and path to a raw io error.
pub trait IoContext<T> {
    fn with_path(self, op: &'static str, path: &Path) -> ProfResult<T>;
}

impl<T> IoContext<T> for Result<T, std::io::Error> {
    fn with_path(self, op: &'static str, path: &Path) -> ProfResult<T> {
        self.map_err(|source| ProfError::FileIo {
            op,
            path: path.to_path_buf(),
            source,
        })
    }
}
