//! A one-shot, cancellable timer driven by the tokio runtime.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

const ARMED: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

/// Runs a callback once after a duration unless cancelled first.
///
/// Firing and cancelling race on a single atomic flag, so exactly one of them
/// takes effect. A winning `cancel` also aborts the sleeping task, which
/// releases the underlying timer entry.
#[derive(Debug)]
pub struct ScheduledTimer {
    status: Arc<AtomicU8>,
    task: JoinHandle<()>,
}

impl ScheduledTimer {
    /// Schedules `callback` to run on `runtime` once `duration` has elapsed.
    pub fn arm(
        runtime: &Handle,
        duration: Duration,
        callback: impl FnOnce() + Send + 'static,
    ) -> Self {
        let status = Arc::new(AtomicU8::new(ARMED));
        let task_status = status.clone();
        let task = runtime.spawn(async move {
            tokio::time::sleep(duration).await;
            if task_status
                .compare_exchange(ARMED, FIRED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                trace!(?duration, "Timer fired.");
                callback();
            }
        });
        Self { status, task }
    }

    /// Prevents a pending callback from running.
    ///
    /// Returns `true` only if the timer had neither fired nor been cancelled.
    /// Calling this after firing, or more than once, is a harmless no-op.
    pub fn cancel(&self) -> bool {
        let cancelled = self
            .status
            .compare_exchange(ARMED, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if cancelled {
            self.task.abort();
        }
        cancelled
    }

    #[cfg(test)]
    fn has_fired(&self) -> bool {
        self.status.load(Ordering::Acquire) == FIRED
    }

    #[cfg(test)]
    fn is_cancelled(&self) -> bool {
        self.status.load(Ordering::Acquire) == CANCELLED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn counting_timer(duration: Duration) -> (ScheduledTimer, Arc<AtomicU32>) {
        let fired = Arc::new(AtomicU32::new(0));
        let counter = fired.clone();
        let timer = ScheduledTimer::arm(&Handle::current(), duration, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (timer, fired)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fires_once_after_duration() {
        let (timer, fired) = counting_timer(Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!timer.has_fired());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(timer.has_fired());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancel_before_firing_wins() {
        let (timer, fired) = counting_timer(Duration::from_millis(50));
        assert!(timer.cancel());
        assert!(timer.is_cancelled());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!timer.has_fired());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancel_after_firing_is_a_no_op() {
        let (timer, fired) = counting_timer(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(!timer.cancel());
        assert!(!timer.cancel());
        assert!(timer.has_fired());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn repeated_cancel_only_succeeds_once() {
        let (timer, _fired) = counting_timer(Duration::from_secs(60));
        assert!(timer.cancel());
        assert!(!timer.cancel());
    }
}
