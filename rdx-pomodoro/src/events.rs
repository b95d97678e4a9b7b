//! Defines the public event types broadcast by a session.
//!
//! Observers registered with `Session::add_observer` receive only the new
//! state. The event stream returned by `Session::subscribe` carries the wider
//! lifecycle, including observer failures, and is meant for monitoring and
//! tests.

use crate::common::SessionState;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// A registered transition callback.
///
/// Observers receive the state the session just entered. Returned errors are
/// logged by the dispatcher and otherwise ignored.
pub type Observer = Arc<dyn Fn(SessionState) -> anyhow::Result<()> + Send + Sync>;

/// Events related to the lifecycle of a single session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Fired once when `start` succeeds.
    Started { at: DateTime<Utc> },
    /// Fired on every transition into `Focusing` or `OnBreak`.
    PhaseChanged { state: SessionState, at: DateTime<Utc> },
    /// Fired when an observer returns an error or panics.
    ObserverFailed {
        state: SessionState,
        observer: usize,
        error: String,
    },
    /// Fired once when a live session is torn down.
    TornDown { at: DateTime<Utc> },
}
