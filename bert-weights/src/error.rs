//! Error types for loading pretrained weights.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for loader operations.
pub type Result<T> = std::result::Result<T, LoadError>;

/// Errors that can occur while resolving, fetching or applying a checkpoint.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The requested name is not in the model catalog.
    #[error("unknown model name '{name}', available: {available}")]
    UnknownModel { name: String, available: String },

    /// The checkpoint could not be downloaded.
    #[error("failed to download {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// The local cache could not be read or written.
    #[error("cache error at {}: {source}", path.display())]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The checkpoint file is corrupt or uses an unsupported layout.
    #[error("failed to deserialize checkpoint {}: {message}", path.display())]
    Deserialize { path: PathBuf, message: String },

    /// A renamed checkpoint tensor does not fit the model parameter of the same name.
    #[error("shape mismatch for '{name}': model expects {expected:?}, checkpoint has {actual:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Model construction or configuration failure.
    #[error("model error: {0}")]
    Model(String),
}

impl LoadError {
    pub(crate) fn model(err: anyhow::Error) -> Self {
        Self::Model(format!("{err:#}"))
    }
}
