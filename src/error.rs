use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::encoder::EncoderError;

/// A failed validation rule, reported as data by [`crate::Connector::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[error("{parameter_name}: {cause}")]
pub struct ValidationError {
    /// Name of the offending parameter.
    pub parameter_name: String,
    /// Human-readable reason.
    pub cause: String,
}

impl ValidationError {
    pub fn new(parameter_name: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            parameter_name: parameter_name.into(),
            cause: cause.into(),
        }
    }
}

/// The encoder could not produce a matrix for the configured input.
///
/// Displays as [`EncodingError::MESSAGE`]; the engine failure is the [`source`](std::error::Error::source).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct EncodingError {
    message: &'static str,
    #[source]
    cause: EncoderError,
}

impl EncodingError {
    pub const MESSAGE: &'static str = "Failed generating QR code";

    pub fn new(cause: EncoderError) -> Self {
        Self {
            message: Self::MESSAGE,
            cause,
        }
    }

    pub fn message(&self) -> &str {
        self.message
    }

    pub fn cause(&self) -> &EncoderError {
        &self.cause
    }

    pub fn into_cause(self) -> EncoderError {
        self.cause
    }
}

impl From<EncoderError> for EncodingError {
    fn from(cause: EncoderError) -> Self {
        Self::new(cause)
    }
}
