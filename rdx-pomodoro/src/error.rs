//! Error types raised at the session boundary.

use crate::common::SessionState;
use thiserror::Error;

/// Returned by `Session::start` when the session is not in `New`.
///
/// The session is left untouched; callers may inspect `current_state` and
/// decide whether to retry, tear down or ignore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid state transition from {from:?} to {to:?}")]
pub struct InvalidStateTransition {
    pub from: SessionState,
    pub to: SessionState,
}

/// Failures while constructing a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{phase} duration must be positive")]
    InvalidDuration { phase: &'static str },

    #[error("sessions must be created inside a tokio runtime: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}
