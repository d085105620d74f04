//! One-shot timer facility.
//!
//! The scheduler only needs "call this once after a delay, unless
//! cancelled". [`TokioTimer`] provides that on a tokio runtime; other
//! implementations can be injected through [`Timer`].

use std::fmt;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// Callback invoked when a timer fires.
pub type FireCallback = Box<dyn FnOnce() + Send + 'static>;

/// Schedules one-shot callbacks.
pub trait Timer: Send + Sync {
    /// Run `on_fire` once after `delay` has elapsed.
    fn after(&self, delay: Duration, on_fire: FireCallback) -> TimerHandle;
}

/// Cancellation side of an armed timer.
pub trait Cancel: Send + Sync + fmt::Debug {
    /// Stop the timer if it has not fired yet.
    fn cancel(&self);

    /// Whether the timer has fired or been cancelled.
    fn is_finished(&self) -> bool;
}

impl Cancel for AbortHandle {
    fn cancel(&self) {
        self.abort();
    }

    fn is_finished(&self) -> bool {
        AbortHandle::is_finished(self)
    }
}

/// Handle to an armed timer.
///
/// Cancellation is best effort: a timer that already fired is not
/// retracted, and its callback may still be running.
pub struct TimerHandle {
    inner: Box<dyn Cancel>,
}

impl TimerHandle {
    /// Wrap a cancellation handle.
    pub fn new(inner: impl Cancel + 'static) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }

    /// Stop the timer if it has not fired yet.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Whether the timer has fired or been cancelled.
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Timer backed by `tokio::time::sleep_until` tasks.
#[derive(Debug, Clone)]
pub struct TokioTimer {
    handle: Handle,
}

impl TokioTimer {
    /// Create a timer that spawns onto the given runtime.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Create a timer bound to the runtime of the calling context.
    ///
    /// Returns `None` outside a tokio runtime.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Timer for TokioTimer {
    fn after(&self, delay: Duration, on_fire: FireCallback) -> TimerHandle {
        // The deadline is fixed here, not when the task is first polled.
        let deadline = tokio::time::Instant::now() + delay;
        let task = self.handle.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            on_fire();
        });
        TimerHandle::new(task.abort_handle())
    }
}
