//! Session manager: the public entry point.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::id::{IdGenerator, UuidGenerator};
use crate::reaper::{Reaper, ReaperStats};
use crate::scheduler::ExpirationScheduler;
use crate::store::{SessionData, SessionInfo, SessionRecord, SessionStore};
use crate::timer::{Timer, TokioTimer};

/// Session manager with automatic expiry.
///
/// A session expires once `ttl` has passed since its last update. Reads
/// never extend a session's life; only [`update_session_data`] does.
///
/// Construction starts a reaper task on the current tokio runtime. Call
/// [`shutdown`] to stop it deterministically; dropping the manager also
/// signals it to stop.
///
/// [`update_session_data`]: SessionManager::update_session_data
/// [`shutdown`]: SessionManager::shutdown
pub struct SessionManager {
    store: Arc<SessionStore>,
    scheduler: ExpirationScheduler,
    ids: Arc<dyn IdGenerator>,
    config: SessionConfig,
    stats: Arc<ReaperStats>,
    shutdown: CancellationToken,
    /// Cancelled once the reaper task has finished draining.
    stopped: CancellationToken,
}

/// Builder for [`SessionManager`] with injectable collaborators.
pub struct SessionManagerBuilder {
    config: SessionConfig,
    ids: Option<Arc<dyn IdGenerator>>,
    timer: Option<Arc<dyn Timer>>,
}

impl SessionManagerBuilder {
    /// Use a custom identifier generator.
    pub fn id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Some(Arc::new(ids));
        self
    }

    /// Use a custom timer facility.
    pub fn timer(mut self, timer: impl Timer + 'static) -> Self {
        self.timer = Some(Arc::new(timer));
        self
    }

    /// Build the manager and start its reaper.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Result<SessionManager> {
        self.config.validate()?;
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;

        let timer = self
            .timer
            .unwrap_or_else(|| Arc::new(TokioTimer::new(runtime.clone())));
        let ids = self.ids.unwrap_or_else(|| Arc::new(UuidGenerator));

        let store = Arc::new(SessionStore::new());
        let stats = Arc::new(ReaperStats::default());
        let shutdown = CancellationToken::new();
        let (scheduler, events) = ExpirationScheduler::new(timer);

        let reaper = Reaper::new(
            Arc::clone(&store),
            events,
            shutdown.clone(),
            Arc::clone(&stats),
        );
        let stopped = CancellationToken::new();
        let done = stopped.clone();
        runtime.spawn(async move {
            let _done = done.drop_guard();
            reaper.run().await;
        });

        debug!(ttl = ?self.config.ttl, "Session manager started");

        Ok(SessionManager {
            store,
            scheduler,
            ids,
            config: self.config,
            stats,
            shutdown,
            stopped,
        })
    }
}

impl SessionManager {
    /// Create a manager with default collaborators.
    pub fn new(config: SessionConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Start building a manager.
    pub fn builder(config: SessionConfig) -> SessionManagerBuilder {
        SessionManagerBuilder {
            config,
            ids: None,
            timer: None,
        }
    }

    /// Get the manager configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Configured session TTL.
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Create an empty session and return its identifier.
    pub fn create_session(&self) -> Result<String> {
        self.ensure_running()?;

        let session_id = self.ids.generate()?;
        let ttl = self.config.ttl;
        self.store.insert_with(&session_id, || {
            // Shutdown may have landed while the id was being generated.
            self.ensure_running()?;
            let expiration = self.scheduler.arm(&session_id, 0, ttl);
            Ok(SessionRecord::new(session_id.clone(), Some(expiration)))
        })?;

        debug!(session_id = %session_id, "Session created");
        Ok(session_id)
    }

    /// Snapshot of a session's data. Does not renew expiration.
    pub fn get_session_data(&self, session_id: &str) -> Result<Arc<SessionData>> {
        self.store
            .get(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }

    /// Replace a session's data and restart its TTL.
    pub fn update_session_data(&self, session_id: &str, data: SessionData) -> Result<()> {
        self.ensure_running()?;

        let ttl = self.config.ttl;
        let data = Arc::new(data);
        let previous = self.store.replace_with(session_id, |current| {
            self.ensure_running()?;
            let expiration = self.scheduler.arm(session_id, current.version + 1, ttl);
            Ok(current.successor(data, Some(expiration)))
        })?;

        if let Some(expiration) = &previous.expiration {
            self.scheduler.cancel(expiration);
        }

        debug!(
            session_id = %session_id,
            version = previous.version + 1,
            "Session data updated"
        );
        Ok(())
    }

    /// Metadata snapshot of a session. Does not renew expiration.
    pub fn session_info(&self, session_id: &str) -> Result<SessionInfo> {
        self.store
            .info(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether there are no live sessions.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Current manager statistics.
    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            active: self.store.len(),
            expired: self.stats.expired(),
            stale_events: self.stats.stale(),
        }
    }

    /// Whether [`shutdown`](SessionManager::shutdown) has been requested.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stop the reaper and disarm every timer.
    ///
    /// Expiration events already queued are applied before the reaper
    /// exits. Stored sessions stay readable but no longer expire, and
    /// further writes fail with [`Error::ShutDown`]. Every caller, including
    /// concurrent ones, returns only after the reaper has stopped.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.stopped.cancelled().await;
        self.disarm_all();
    }

    fn ensure_running(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(Error::ShutDown);
        }
        Ok(())
    }

    fn disarm_all(&self) {
        for expiration in self.store.take_expirations() {
            self.scheduler.cancel(&expiration);
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.disarm_all();
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .field("sessions", &self.store.len())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

/// Manager statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerStats {
    /// Sessions currently stored.
    pub active: usize,

    /// Sessions removed by expiration.
    pub expired: u64,

    /// Expiration events discarded because the session had been updated.
    pub stale_events: u64,
}
