/// Errors surfaced by the reservoir model crates
///
/// All of these are fatal to the rollout that triggered them; there is no
/// retry or recovery path.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid geometry or hyperparameter configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An array did not have the shape the operation requires
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Description of the expected shape
        expected: String,
        /// Description of the shape that was supplied
        actual: String,
    },

    /// `increment_state` or `predict` was called before `reset_state`
    #[error("reservoir state is not initialized, call reset_state first")]
    StateNotInitialized,

    /// A variable named in the adapter configuration is absent from the dataset
    #[error("variable '{0}' missing from input dataset")]
    MissingVariable(String),

    /// The persisted model tag does not name a known model type
    #[error("unknown model tag '{0}'")]
    UnknownModelTag(String),

    /// Readout fitting failed
    #[error("readout fit failed: {0}")]
    Regression(#[from] lin_reg::LinRegError),

    /// Underlying filesystem failure while dumping or loading
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted record could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;
