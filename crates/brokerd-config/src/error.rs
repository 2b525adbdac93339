//! Configuration error types.

/// Errors from resolving the gateway's environment-variable
/// configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable was not set.
    #[error("missing required environment variable {name}")]
    MissingRequired {
        /// The variable name.
        name: String,
    },

    /// A variable was set but could not be parsed into the expected type.
    #[error("environment variable {name} has an invalid value: {reason}")]
    InvalidValue {
        /// The variable name.
        name: String,
        /// Why parsing failed.
        reason: String,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
