//! # Pomodoro
//!
//! A focus/break session engine for Rust, with a Slack slash-command front end.
//!
//! The heart of the crate is [`Session`](session::Session): a small state
//! machine that alternates between a focus phase and a break phase until it
//! is torn down, and tells every registered observer about each transition.
//!
//! ## Core Concepts
//!
//! - **Session**: owns the current state, the two phase lengths, the single
//!   pending timer and the observer list. All of it sits behind one lock, so a
//!   timer expiry racing with `teardown` always ends in `Invalid`.
//! - **Scheduled Timer**: a one-shot, cancellable tokio timer. Each phase
//!   arms a fresh one.
//! - **Observer Dispatch**: transitions are snapshotted and handed to a
//!   worker that runs observers on the blocking pool. A slow or failing
//!   observer is logged and never holds up the next phase.
//! - **Boundary adapters**: `slack` decodes form-encoded slash commands,
//!   `notifier` posts transitions back to Slack and `server` wires both to
//!   sessions over HTTP.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use pomodoro::prelude::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // 1. Create a session with a 25 minute focus and a 5 minute break.
//!     let session = Session::new(Duration::from_secs(25 * 60), Duration::from_secs(5 * 60))?;
//!
//!     // 2. Register observers before starting.
//!     session.add_observer(|state| {
//!         println!("Session is now {}", state);
//!         Ok(())
//!     });
//!
//!     // 3. Start cycling. Observers hear about `Focusing` right away.
//!     session.start()?;
//!
//!     // 4. Tear down on Ctrl+C.
//!     tokio::signal::ctrl_c().await?;
//!     session.teardown();
//!     Ok(())
//! }
//! ```

pub const ENGINE_NAME: &str = "Pomodoro Engine";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");


// Declare all the modules in the crate.
pub mod common;
pub mod components;
pub mod config;
pub mod error;
pub mod events;
pub mod notifier;
pub mod server;
pub mod session;
pub mod slack;

/// A prelude module for easy importing of the most common types.
pub mod prelude {
    pub use crate::common::{SessionId, SessionState};
    pub use crate::components::dispatcher::DispatchStats;
    pub use crate::config::PomodoroConfig;
    pub use crate::error::{InvalidStateTransition, SessionError};
    pub use crate::events::{Observer, SessionEvent};
    pub use crate::session::Session;
}
