//! Error types for the lansweep binary.
//!
//! ServerError wraps CoreError from the shared library and adds
//! binary-specific variants.

use lansweep_core::error::CoreError;
use thiserror::Error;

/// Exit codes for the binary
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const NETWORK_ERROR: i32 = 2;
    pub const REGISTRY_ERROR: i32 = 3;
    pub const INVALID_ARGS: i32 = 4;
}

/// Main error type for the binary
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Other(String),
}

impl ServerError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ServerError::Core(e) => match e {
                CoreError::Registry(_) => exit_codes::REGISTRY_ERROR,
                CoreError::Relay(_) => exit_codes::NETWORK_ERROR,
                CoreError::Sweep(_) => exit_codes::INVALID_ARGS,
                CoreError::Io(_) => exit_codes::GENERAL_ERROR,
                CoreError::Other(_) => exit_codes::GENERAL_ERROR,
            },
            ServerError::Io(_) => exit_codes::GENERAL_ERROR,
            ServerError::InvalidArgument(_) => exit_codes::INVALID_ARGS,
            ServerError::Other(_) => exit_codes::GENERAL_ERROR,
        }
    }
}

/// Result type for binary operations
pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use lansweep_core::error::SweepError;

    #[test]
    fn test_sweep_errors_map_to_invalid_args() {
        let err = ServerError::Core(CoreError::Sweep(SweepError::UnsupportedSubnet(
            "10.0.0.0/8".to_string(),
        )));
        assert_eq!(err.exit_code(), exit_codes::INVALID_ARGS);
    }

    #[test]
    fn test_invalid_argument_exit_code() {
        let err = ServerError::InvalidArgument("bad ip".to_string());
        assert_eq!(err.exit_code(), exit_codes::INVALID_ARGS);
    }
}
