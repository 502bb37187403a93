//! Error taxonomy for the inference runtime.
//!
//! Recoverable failures (layer validation, malformed arguments) are reported
//! as [`HugurError`] values. Configuration and resource failures the engine
//! cannot continue past (allocator exhaustion, a kernel missing for the
//! requested device) are fatal: they log the code and message and panic, so
//! the diagnostic carries file and line for post-mortem analysis.

use thiserror::Error;

/// Errors that can occur inside the runtime core.
///
/// Numeric codes mirror the engine's wire taxonomy; `Ok(())` is code 0.
/// Code 4 is intentionally unassigned.
#[derive(Debug, Error)]
pub enum HugurError {
    /// The requested operation has no implementation for the device. (code 1)
    #[error("function not implemented: {0}")]
    FunctionNotImplemented(String),

    /// Reserved for model loading. Unused by this core. (code 2)
    #[error("path not valid: {0}")]
    PathNotValid(String),

    /// Reserved for model loading. Unused by this core. (code 3)
    #[error("model parse error: {0}")]
    ModelParseError(String),

    /// Unexpected runtime condition. (code 5)
    #[error("internal error: {0}")]
    InternalError(String),

    /// Layer validation failure: wrong buffer count, mismatched size,
    /// unbound tensor, out-of-range parameter. (code 6)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl HugurError {
    /// Numeric status code for diagnostics and logs.
    pub fn code(&self) -> u8 {
        match self {
            HugurError::FunctionNotImplemented(_) => 1,
            HugurError::PathNotValid(_) => 2,
            HugurError::ModelParseError(_) => 3,
            HugurError::InternalError(_) => 5,
            HugurError::InvalidArgument(_) => 6,
        }
    }
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, HugurError>;

/// Terminates the process with a diagnostic for unrecoverable conditions.
///
/// Continuing with partially allocated memory or a silently missing kernel
/// would corrupt downstream results in ways the core cannot detect, so these
/// conditions are never converted into recoverable errors.
#[macro_export]
macro_rules! fatal {
    ($err:expr) => {{
        let err: $crate::error::HugurError = $err;
        log::error!("fatal inference error: code={} msg={}", err.code(), err);
        panic!("fatal inference error (code {}): {}", err.code(), err);
    }};
}
