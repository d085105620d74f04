//! Per-session expiration timers.
//!
//! Each armed timer, when it fires, sends an [`ExpirationEvent`] tagged
//! with the version it was armed for. Nothing is deleted here: the reaper
//! decides whether the event still applies.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::trace;

use crate::timer::{Timer, TimerHandle};

/// Expiration notice for one version of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpirationEvent {
    pub session_id: String,
    pub version: u64,
}

/// Arms and cancels expiration timers.
pub struct ExpirationScheduler {
    timer: Arc<dyn Timer>,
    events: mpsc::UnboundedSender<ExpirationEvent>,
}

impl ExpirationScheduler {
    /// Create a scheduler and the receiving end of its event queue.
    pub fn new(timer: Arc<dyn Timer>) -> (Self, mpsc::UnboundedReceiver<ExpirationEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { timer, events }, rx)
    }

    /// Arm a timer that emits an event for `version` after `ttl`.
    pub fn arm(&self, session_id: &str, version: u64, ttl: Duration) -> TimerHandle {
        let event = ExpirationEvent {
            session_id: session_id.to_string(),
            version,
        };
        let events = self.events.clone();

        trace!(session_id = %session_id, version, ?ttl, "Arming expiration");
        self.timer.after(
            ttl,
            Box::new(move || {
                let session_id = event.session_id.clone();
                if events.send(event).is_err() {
                    trace!(session_id = %session_id, "Expiration fired after reaper stopped");
                }
            }),
        )
    }

    /// Best-effort cancel. An event already sent stays queued.
    pub fn cancel(&self, handle: &TimerHandle) {
        if !handle.is_finished() {
            handle.cancel();
        }
    }
}

impl std::fmt::Debug for ExpirationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpirationScheduler")
            .field("reaper_alive", &!self.events.is_closed())
            .finish()
    }
}
