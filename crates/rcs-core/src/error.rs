//! Error taxonomy surfaced across the control-plane boundary.
//!
//! Every fallible engine operation returns an [`EngineError`].  The transport
//! collaborator only needs the coarse [`ErrorKind`] to decide what to tell the
//! operator; the message carries the detail for logs.
//!
//! | Kind                     | Raised when                                              |
//! |--------------------------|----------------------------------------------------------|
//! | `invalid-session`        | a shell session id is unknown                            |
//! | `device-unavailable`     | a capture or audio device is missing, busy, or undiscoverable |
//! | `precondition-violation` | a request is malformed or a setting is out of range      |
//! | `transient-io-error`     | a running stream hit a read/write failure                |

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for all engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The referenced shell session does not exist.
    #[error("invalid session: {0}")]
    InvalidSession(String),

    /// A capture or audio device could not be opened or discovered.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The request was rejected before any resource was touched.
    #[error("precondition violation: {0}")]
    PreconditionViolation(String),

    /// A running stream failed mid-flight.
    #[error("transient I/O error: {0}")]
    TransientIo(String),
}

impl EngineError {
    /// Returns the coarse error category for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidSession(_) => ErrorKind::InvalidSession,
            EngineError::DeviceUnavailable(_) => ErrorKind::DeviceUnavailable,
            EngineError::PreconditionViolation(_) => ErrorKind::PreconditionViolation,
            EngineError::TransientIo(_) => ErrorKind::TransientIoError,
        }
    }
}

/// Coarse error category, serialized with its kebab-case wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    InvalidSession,
    DeviceUnavailable,
    PreconditionViolation,
    TransientIoError,
}

impl ErrorKind {
    /// Returns the wire name of this category (e.g. `"invalid-session"`).
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidSession => "invalid-session",
            ErrorKind::DeviceUnavailable => "device-unavailable",
            ErrorKind::PreconditionViolation => "precondition-violation",
            ErrorKind::TransientIoError => "transient-io-error",
        }
    }
}

/// Convenience alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;
