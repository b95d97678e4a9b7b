//! The focus/break session state machine.

use crate::common::SessionState;
use crate::components::dispatcher::{DispatchStats, Dispatcher, DISPATCH_QUEUE_CAPACITY};
use crate::components::timer::ScheduledTimer;
use crate::error::{InvalidStateTransition, SessionError};
use crate::events::{Observer, SessionEvent};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A recurring focus/break session.
///
/// `start` enters the focus phase and arms a timer. Each expiry flips the
/// session between `Focusing` and `OnBreak` and arms the next timer, until
/// `teardown` cancels it and parks the session in `Invalid`. Every transition
/// is handed to the registered observers on a separate worker, so a slow or
/// failing observer never delays the next phase.
///
/// `Session` is a cheap handle: clones share the same state machine and may
/// be used from any task or thread.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

struct Inner {
    focus_duration: Duration,
    break_duration: Duration,
    runtime: Handle,
    event_sender: broadcast::Sender<SessionEvent>,
    stats: Arc<DispatchStats>,
    core: Mutex<Core>,
}

/// Everything a transition reads or writes, guarded by one lock.
struct Core {
    state: SessionState,
    state_timestamp: DateTime<Utc>,
    pending_timer: Option<ScheduledTimer>,
    observers: Vec<Observer>,
    dispatcher: Option<Dispatcher>,
}

// Public API implementation block.
impl Session {
    /// Creates a session in `New` with no observers and no pending timer.
    ///
    /// Must be called from within a tokio runtime; the runtime's handle is
    /// kept for arming timers and running observers.
    pub fn new(focus_duration: Duration, break_duration: Duration) -> Result<Self, SessionError> {
        if focus_duration.is_zero() {
            return Err(SessionError::InvalidDuration { phase: "focus" });
        }
        if break_duration.is_zero() {
            return Err(SessionError::InvalidDuration { phase: "break" });
        }
        let runtime = Handle::try_current()?;
        let (event_sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let stats = Arc::new(DispatchStats::default());
        let dispatcher = Dispatcher::spawn(
            &runtime,
            DISPATCH_QUEUE_CAPACITY,
            event_sender.clone(),
            stats.clone(),
        );

        Ok(Self {
            inner: Arc::new(Inner {
                focus_duration,
                break_duration,
                runtime,
                event_sender,
                stats,
                core: Mutex::new(Core {
                    state: SessionState::New,
                    state_timestamp: Utc::now(),
                    pending_timer: None,
                    observers: Vec::new(),
                    dispatcher: Some(dispatcher),
                }),
            }),
        })
    }

    /// Returns the current state.
    pub fn current_state(&self) -> SessionState {
        self.inner.lock_core().state
    }

    /// Returns when the session last changed state.
    pub fn state_timestamp(&self) -> DateTime<Utc> {
        self.inner.lock_core().state_timestamp
    }

    pub fn focus_duration(&self) -> Duration {
        self.inner.focus_duration
    }

    pub fn break_duration(&self) -> Duration {
        self.inner.break_duration
    }

    pub fn observer_count(&self) -> usize {
        self.inner.lock_core().observers.len()
    }

    /// Delivery counters for this session's observers.
    pub fn dispatch_stats(&self) -> &DispatchStats {
        &self.inner.stats
    }

    /// Subscribes to the `SessionEvent` stream.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.event_sender.subscribe()
    }

    /// Registers a callback for every subsequent transition.
    ///
    /// Observers are called in registration order with the state just
    /// entered. An error returned by an observer is logged and does not stop
    /// delivery to the others. Observers cannot be removed.
    pub fn add_observer(
        &self,
        observer: impl Fn(SessionState) -> anyhow::Result<()> + Send + Sync + 'static,
    ) {
        let mut core = self.inner.lock_core();
        core.observers.push(Arc::new(observer));
        debug!(count = core.observers.len(), "Observer registered.");
    }

    /// Starts the first focus phase.
    ///
    /// Fails without side effects unless the session is `New`.
    pub fn start(&self) -> Result<(), InvalidStateTransition> {
        let mut core = self.inner.lock_core();
        if core.state != SessionState::New {
            return Err(InvalidStateTransition {
                from: core.state,
                to: SessionState::Focusing,
            });
        }
        info!(
            focus = ?self.inner.focus_duration,
            rest = ?self.inner.break_duration,
            "Session starting."
        );
        self.inner
            .event_sender
            .send(SessionEvent::Started { at: Utc::now() })
            .ok();
        self.inner.enter(&mut core, SessionState::Focusing);
        Ok(())
    }

    /// Cancels the pending timer and moves the session to `Invalid`.
    ///
    /// Safe to call from any state and any number of times. A timer that
    /// already fired and is waiting on the lock will find `Invalid` and do
    /// nothing. Queued deliveries are discarded; an observer call already
    /// running is allowed to finish.
    pub fn teardown(&self) {
        let mut core = self.inner.lock_core();
        if let Some(timer) = core.pending_timer.take() {
            let cancelled = timer.cancel();
            trace!(cancelled, "Pending timer released.");
        }
        if let Some(dispatcher) = core.dispatcher.take() {
            dispatcher.halt();
        }
        if core.state == SessionState::Invalid {
            return;
        }
        let previous = core.state;
        core.state = SessionState::Invalid;
        core.state_timestamp = Utc::now();
        info!(from = %previous, "Session torn down.");
        self.inner
            .event_sender
            .send(SessionEvent::TornDown {
                at: core.state_timestamp,
            })
            .ok();
    }
}

// Core implementation block for internal logic.
impl Inner {
    fn lock_core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves into `next`, notifies observers and arms the timer that ends it.
    ///
    /// The caller holds the core lock, so the state and its timer change
    /// together.
    fn enter(self: &Arc<Self>, core: &mut Core, next: SessionState) {
        let now = Utc::now();
        core.state = next;
        core.state_timestamp = now;
        if let Some(dispatcher) = &core.dispatcher {
            dispatcher.dispatch(next, core.observers.clone());
        }

        let duration = match next {
            SessionState::OnBreak => self.break_duration,
            _ => self.focus_duration,
        };
        let session = Arc::downgrade(self);
        core.pending_timer = Some(ScheduledTimer::arm(&self.runtime, duration, move || {
            Inner::advance_phase(&session)
        }));

        self.event_sender
            .send(SessionEvent::PhaseChanged { state: next, at: now })
            .ok();
        debug!(state = %next, ?duration, "Entered phase.");
    }

    /// Timer expiry handler.
    fn advance_phase(session: &Weak<Inner>) {
        let Some(inner) = session.upgrade() else {
            trace!("Session dropped before its timer expired.");
            return;
        };
        let mut core = inner.lock_core();
        let next = match core.state {
            SessionState::Focusing => SessionState::OnBreak,
            SessionState::OnBreak => SessionState::Focusing,
            SessionState::Invalid => {
                trace!("Timer expired after teardown; discarded.");
                return;
            }
            SessionState::New => {
                warn!("Timer expired on a session that never started; discarded.");
                return;
            }
        };
        info!(from = %core.state, to = %next, "Phase complete.");
        inner.enter(&mut core, next);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.lock_core();
        f.debug_struct("Session")
            .field("state", &core.state)
            .field("state_timestamp", &core.state_timestamp)
            .field("focus_duration", &self.inner.focus_duration)
            .field("break_duration", &self.inner.break_duration)
            .field("observers", &core.observers.len())
            .finish()
    }
}
