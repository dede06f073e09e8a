use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DutyCycleError {
    #[error("variable store error: {0}")]
    Store(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    State(String),
    #[error("thread error: {0}")]
    Thread(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing peer address")]
    MissingAddress,
    #[error("missing transport")]
    MissingTransport,
    #[error("missing variable store")]
    MissingStore,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

/// Map a trait-boundary store error to a typed error.
pub fn map_store_error(e: &(dyn std::error::Error + 'static)) -> DutyCycleError {
    DutyCycleError::Store(e.to_string())
}

/// Map a trait-boundary transport error to a typed error.
pub fn map_transport_error(e: &(dyn std::error::Error + 'static)) -> DutyCycleError {
    DutyCycleError::Transport(e.to_string())
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
