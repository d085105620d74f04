//! Background task that applies expiration events.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::scheduler::ExpirationEvent;
use crate::store::SessionStore;

/// Counters maintained by the reaper.
#[derive(Debug, Default)]
pub struct ReaperStats {
    expired: AtomicU64,
    stale: AtomicU64,
}

impl ReaperStats {
    /// Sessions deleted by a matching event.
    pub fn expired(&self) -> u64 {
        self.expired.load(Ordering::Relaxed)
    }

    /// Events discarded because the session had moved on.
    pub fn stale(&self) -> u64 {
        self.stale.load(Ordering::Relaxed)
    }
}

/// Single consumer of the expiration queue.
///
/// Each event deletes its session only if the stored version still
/// equals the event's version; otherwise the event is dropped.
pub struct Reaper {
    store: Arc<SessionStore>,
    events: mpsc::UnboundedReceiver<ExpirationEvent>,
    shutdown: CancellationToken,
    stats: Arc<ReaperStats>,
}

impl Reaper {
    pub fn new(
        store: Arc<SessionStore>,
        events: mpsc::UnboundedReceiver<ExpirationEvent>,
        shutdown: CancellationToken,
        stats: Arc<ReaperStats>,
    ) -> Self {
        Self {
            store,
            events,
            shutdown,
            stats,
        }
    }

    /// Consume events until shutdown is requested or every sender is gone.
    ///
    /// On shutdown, events already queued are still applied before returning.
    pub async fn run(mut self) {
        info!("Session reaper started");

        loop {
            tokio::select! {
                biased;
                event = self.events.recv() => match event {
                    Some(event) => self.apply(event),
                    None => break,
                },
                _ = self.shutdown.cancelled() => {
                    self.events.close();
                    while let Ok(event) = self.events.try_recv() {
                        self.apply(event);
                    }
                    break;
                }
            }
        }

        info!(
            expired = self.stats.expired(),
            stale = self.stats.stale(),
            "Session reaper stopped"
        );
    }

    fn apply(&self, event: ExpirationEvent) {
        if self
            .store
            .delete_if_version(&event.session_id, event.version)
        {
            self.stats.expired.fetch_add(1, Ordering::Relaxed);
            debug!(
                session_id = %event.session_id,
                version = event.version,
                "Session expired"
            );
        } else {
            self.stats.stale.fetch_add(1, Ordering::Relaxed);
            trace!(
                session_id = %event.session_id,
                version = event.version,
                "Discarding stale expiration"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SessionData, SessionRecord};

    fn event(session_id: &str, version: u64) -> ExpirationEvent {
        ExpirationEvent {
            session_id: session_id.to_string(),
            version,
        }
    }

    fn seeded_store() -> Arc<SessionStore> {
        let store = Arc::new(SessionStore::new());
        store
            .insert_with("session-1", || Ok(SessionRecord::new("session-1", None)))
            .unwrap();
        store
            .replace_with("session-1", |current| {
                Ok(current.successor(Arc::new(SessionData::new()), None))
            })
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_applies_queued_events_on_shutdown() {
        let store = seeded_store();
        let stats = Arc::new(ReaperStats::default());
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(event("session-1", 0)).unwrap();
        tx.send(event("session-1", 1)).unwrap();
        tx.send(event("unknown", 0)).unwrap();
        token.cancel();

        Reaper::new(Arc::clone(&store), rx, token, Arc::clone(&stats))
            .run()
            .await;

        assert!(store.get("session-1").is_none());
        assert_eq!(stats.expired(), 1);
        assert_eq!(stats.stale(), 2);
    }

    #[tokio::test]
    async fn test_stale_event_keeps_session() {
        let store = seeded_store();
        let stats = Arc::new(ReaperStats::default());
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(event("session-1", 0)).unwrap();
        drop(tx);

        Reaper::new(
            Arc::clone(&store),
            rx,
            CancellationToken::new(),
            Arc::clone(&stats),
        )
        .run()
        .await;

        assert!(store.get("session-1").is_some());
        assert_eq!(stats.stale(), 1);
        assert_eq!(stats.expired(), 0);
    }
}
