//! Error types for lansweep core.

use thiserror::Error;

/// Core error type for shared operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Sweep error: {0}")]
    Sweep(#[from] SweepError),

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Device registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to open registry backend: {0}")]
    Open(String),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),
}

impl From<diesel::result::Error> for RegistryError {
    fn from(e: diesel::result::Error) -> Self {
        RegistryError::Query(e.to_string())
    }
}

impl From<diesel::r2d2::PoolError> for RegistryError {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        RegistryError::Pool(e.to_string())
    }
}

/// Network sweep errors
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Unsupported subnet (only /24 is supported): {0}")]
    UnsupportedSubnet(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("No subnet configured and no local IPv4 address found")]
    NoSubnet,
}

/// Event relay errors
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Transport setup failed: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
