use std::path::PathBuf;

use thiserror::Error;

/// Failure while producing a classification.
///
/// A pipeline output with no usable scores is not an error; it yields the
/// `"unknown"` result instead.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// The classification pipeline could not be constructed.
    #[error("failed to load classification pipeline: {0:#}")]
    Load(anyhow::Error),

    /// The pipeline was loaded but failed on this input.
    #[error("{0:#}")]
    Inference(anyhow::Error),

    /// The blocking inference task panicked or was cancelled.
    #[error("inference task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Invalid service configuration. Aborts startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The layered configuration sources could not be merged or parsed.
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// A configuration file was named explicitly but does not exist.
    #[error("configuration file {0:?} not found")]
    MissingFile(PathBuf),

    /// `model.device` did not name a known device.
    #[error("invalid device '{0}': expected 'auto', 'cpu', 'cuda' or 'cuda:<index>'")]
    Device(String),

    /// A CORS origin pattern is not `scheme://host[:port]` or `scheme://*.suffix`.
    #[error("invalid CORS origin pattern '{0}'")]
    Origin(String),
}
