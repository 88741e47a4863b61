use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TerrainError {
    #[error("malformed tile {}: {reason}", path.display())]
    MalformedTile { path: PathBuf, reason: String },

    #[error("read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TerrainError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        TerrainError::MalformedTile { path: path.into(), reason: reason.into() }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TerrainError::Io { path: path.into(), source }
    }
}
