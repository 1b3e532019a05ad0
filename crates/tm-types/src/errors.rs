use thiserror::Error;

/// Main error type for Trialmux
#[derive(Error, Debug)]
pub enum TmError {
    #[error("Allocator error: {0}")]
    Allocator(#[from] AllocatorError),

    #[error("Trial error: {0}")]
    Trial(#[from] TrialError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Device allocator errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocatorError {
    #[error("Invalid release of device {device}: {reason}")]
    InvalidRelease { device: usize, reason: String },

    #[error("Device pool must contain at least one device")]
    EmptyPool,
}

/// Errors raised while evaluating a single trial
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrialError {
    #[error("Objective failed: {message}")]
    Objective { message: String },

    #[error("Objective panicked: {message}")]
    Panicked { message: String },

    #[error("Objective returned a non-finite value: {value}")]
    NonFiniteObjective { value: f64 },
}

impl TrialError {
    pub fn objective(message: impl Into<String>) -> Self {
        Self::Objective {
            message: message.into(),
        }
    }
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type alias for Trialmux operations
pub type TmResult<T> = Result<T, TmError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::TmError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::TmError::Internal(format!($($arg)*))
    };
}
