//! Contains common, primitive types shared across the crate.
//!
//! This module defines the session state enum and the key type used to
//! identify sessions held by the slash-command listener.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;

new_key_type! {
    /// Uniquely and safely identifies a session held in a `SessionRegistry`.
    ///
    /// Keys are never reused, so a stale id from a torn-down session cannot
    /// address a newer one.
    pub struct SessionId;
}

/// The state of a focus/break session.
///
/// `New` is the only initial state and `Invalid` the only terminal one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Created but not started.
    New,
    /// Inside a focus phase.
    Focusing,
    /// Inside a break phase.
    #[serde(rename = "breaking")]
    OnBreak,
    /// Torn down. No further transitions happen.
    Invalid,
}

impl SessionState {
    /// The lowercase name used in logs, events and outbound payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::New => "new",
            SessionState::Focusing => "focusing",
            SessionState::OnBreak => "breaking",
            SessionState::Invalid => "invalid",
        }
    }

    /// Whether the session is cycling between focus and break.
    pub fn is_running(&self) -> bool {
        matches!(self, SessionState::Focusing | SessionState::OnBreak)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_match_display() {
        for state in [
            SessionState::New,
            SessionState::Focusing,
            SessionState::OnBreak,
            SessionState::Invalid,
        ] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state));
        }
    }

    #[test]
    fn only_focus_and_break_are_running() {
        assert!(SessionState::Focusing.is_running());
        assert!(SessionState::OnBreak.is_running());
        assert!(!SessionState::New.is_running());
        assert!(!SessionState::Invalid.is_running());
    }
}
