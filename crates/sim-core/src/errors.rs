//! The kernel's error taxonomy (§7). Per-change and per-event failures are
//! logged and swallowed by the driver; only the structural variants here
//! (`InvalidRunState`, `Cancelled`) ever leave the kernel as `Result::Err`.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error("no handler registered for event type: {0}")]
    UnknownEventType(String),

    #[error("entity not found in state: {0}")]
    UnknownEntity(String),

    #[error("field not recognised: {0}")]
    UnknownField(String),

    #[error("type mismatch on field {field}: expected {expected}")]
    TypeMismatch { field: String, expected: &'static str },

    #[error("propagation failed: {0}")]
    PropagationError(String),

    #[error("operation requires a completed run: {0}")]
    InvalidRunState(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("internal error: {0}")]
    Internal(String),
}
