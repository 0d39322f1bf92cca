//! Error types for threadscope

use std::panic::Location;

use thiserror::Error;

/// Errors returned by a carrier when it is used outside its protocol
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CarrierError {
    /// `provide` was called while a value is already provided on this thread.
    ///
    /// `call_site` is where the active value was provided.
    #[error("Failed to provide value: already provided on this thread at {call_site}")]
    AlreadyProvided {
        call_site: &'static Location<'static>,
    },

    /// A value was requested while none is provided on this thread.
    #[error("No value has been provided on this thread")]
    NotProvided,
}

impl CarrierError {
    pub fn is_already_provided(&self) -> bool {
        matches!(self, CarrierError::AlreadyProvided { .. })
    }

    pub fn is_not_provided(&self) -> bool {
        matches!(self, CarrierError::NotProvided)
    }
}

/// Result type for carrier operations
pub type CarrierResult<T> = Result<T, CarrierError>;

/// Errors raised while reading carrier configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown capture mode: {0:?} (expected \"full\" or \"call-site\")")]
    UnknownCaptureMode(String),

    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}
