use thiserror::Error;

/// Core error type shared across lineagen crates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Invalid construction parameters or an unknown taxonomy key.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// An operation was requested before the state it depends on exists.
    #[error("state error: {0}")]
    State(String),
    /// The requested export format is not one of json, gexf, graphml.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Convenience alias for results returned by lineagen crates.
pub type Result<T> = std::result::Result<T, Error>;
