//! Delivers state transitions to observers off the scheduling path.

use crate::common::SessionState;
use crate::events::{Observer, SessionEvent};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Snapshots that may wait behind the one being delivered.
pub(crate) const DISPATCH_QUEUE_CAPACITY: usize = 64;

/// Delivery counters for a session's observers.
#[derive(Debug, Default)]
pub struct DispatchStats {
    dispatched: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl DispatchStats {
    /// Number of transition snapshots handed to the worker.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Number of observer invocations that returned `Ok`.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Number of observer invocations that returned an error or panicked.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Number of snapshots discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// The state and observer list captured at the moment of a transition.
struct Snapshot {
    state: SessionState,
    observers: Vec<Observer>,
}

/// Owns the worker task that runs observers.
///
/// Snapshots are queued without blocking. The worker hands each one to the
/// blocking pool, so a slow observer delays later deliveries but never the
/// session's timers. The queue is bounded; a snapshot that finds it full is
/// dropped and counted.
///
/// `halt` stops delivery for good: whatever is still queued is discarded and
/// no further observer call begins. Merely dropping the dispatcher closes the
/// queue and lets the worker drain it first.
#[doc(hidden)]
pub(crate) struct Dispatcher {
    queue: mpsc::Sender<Snapshot>,
    halted: Arc<AtomicBool>,
    stats: Arc<DispatchStats>,
    _worker: JoinHandle<()>,
}

impl Dispatcher {
    pub(crate) fn spawn(
        runtime: &Handle,
        capacity: usize,
        events: broadcast::Sender<SessionEvent>,
        stats: Arc<DispatchStats>,
    ) -> Self {
        let (queue, rx) = mpsc::channel(capacity);
        let halted = Arc::new(AtomicBool::new(false));
        let worker = runtime.spawn(worker_loop(rx, halted.clone(), events, stats.clone()));
        Self {
            queue,
            halted,
            stats,
            _worker: worker,
        }
    }

    /// Queues `state` for delivery to `observers`, in order.
    pub(crate) fn dispatch(&self, state: SessionState, observers: Vec<Observer>) {
        if observers.is_empty() || self.halted.load(Ordering::Acquire) {
            return;
        }
        match self.queue.try_send(Snapshot { state, observers }) {
            Ok(()) => {
                self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(%state, "Dispatch queue full; transition not delivered.");
            }
            Err(TrySendError::Closed(_)) => {
                warn!(%state, "Dispatch worker is gone; transition not delivered.");
            }
        }
    }

    /// Discards queued snapshots and stops any further observer calls. A call
    /// already in progress runs to completion.
    pub(crate) fn halt(&self) {
        self.halted.store(true, Ordering::Release);
    }
}

#[doc(hidden)]
async fn worker_loop(
    mut rx: mpsc::Receiver<Snapshot>,
    halted: Arc<AtomicBool>,
    events: broadcast::Sender<SessionEvent>,
    stats: Arc<DispatchStats>,
) {
    while let Some(snapshot) = rx.recv().await {
        if halted.load(Ordering::Acquire) {
            debug!("Dispatcher halted; dropping queued snapshots.");
            return;
        }
        let events = events.clone();
        let stats = stats.clone();
        let halted = halted.clone();
        let state = snapshot.state;
        let delivery =
            tokio::task::spawn_blocking(move || deliver(snapshot, &halted, &events, &stats));
        if let Err(e) = delivery.await {
            error!(%state, "Observer delivery task failed: {}", e);
        }
    }
    debug!("Dispatch queue closed; worker exiting.");
}

fn deliver(
    snapshot: Snapshot,
    halted: &AtomicBool,
    events: &broadcast::Sender<SessionEvent>,
    stats: &DispatchStats,
) {
    let state = snapshot.state;
    for (index, observer) in snapshot.observers.iter().enumerate() {
        if halted.load(Ordering::Acquire) {
            return;
        }
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| observer(state)));
        let error = match outcome {
            Ok(Ok(())) => {
                stats.delivered.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            Ok(Err(e)) => format!("{:#}", e),
            Err(_) => "observer panicked".to_string(),
        };
        warn!(%state, observer = index, "Observer returned error: {}", error);
        stats.failed.fetch_add(1, Ordering::Relaxed);
        events
            .send(SessionEvent::ObserverFailed {
                state,
                observer: index,
                error,
            })
            .ok();
    }
}
