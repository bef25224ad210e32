//! Error taxonomy for capability lookup, binding, and dispatch.

use thiserror::Error;

/// Failures surfaced at the invocation boundary.
///
/// Every variant renders a message suitable for direct display to the
/// remote caller; none of them should ever take the host process down.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CapabilityError {
    /// The capability name is not present in the catalog.
    #[error("{kind} '{name}' not found")]
    NotFound { kind: String, name: String },

    /// Missing required parameter, failed coercion, or an undispatchable
    /// descriptor.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The handler body returned an error or panicked.
    #[error("handler '{name}' failed: {message}")]
    HandlerFailure {
        name: String,
        message: String,
        trace: Option<String>,
    },

    /// A deferred (main-thread) result did not arrive before its deadline.
    #[error("'{name}' timed out after {seconds:.1}s waiting for the host main thread")]
    Timeout { name: String, seconds: f64 },
}

impl CapabilityError {
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Stable snake_case identifier of the error kind, used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::HandlerFailure { .. } => "handler_failure",
            Self::Timeout { .. } => "timeout",
        }
    }

    /// Captured trace for handler failures, if any.
    pub fn trace(&self) -> Option<&str> {
        match self {
            Self::HandlerFailure { trace, .. } => trace.as_deref(),
            _ => None,
        }
    }
}
