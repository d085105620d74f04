//! In-memory session manager with versioned TTL expiration.
//!
//! Sessions are short-lived key/value records that expire a fixed
//! duration after their last update. Every update bumps the session's
//! version and arms a fresh timer tagged with that version; when a timer
//! fires, the reaper deletes the session only if it is still at the
//! tagged version. A refresh racing an expiration therefore can never
//! lose the refreshed session, whether or not the old timer was
//! cancelled in time.
//!
//! # Example
//!
//! ```rust,ignore
//! use lapse_session::{SessionConfig, SessionData, SessionManager};
//!
//! let manager = SessionManager::new(SessionConfig::default())?;
//! let id = manager.create_session()?;
//! manager.update_session_data(&id, SessionData::from([
//!     ("website".to_string(), "longhoang.de".into()),
//! ]))?;
//! let data = manager.get_session_data(&id)?;
//! manager.shutdown().await;
//! ```

mod config;
mod error;
mod id;
mod manager;
mod reaper;
mod scheduler;
mod store;
mod timer;

pub use config::{DEFAULT_TTL, SessionConfig};
pub use error::{Error, Result};
pub use id::{GeneratorError, IdGenerator, UuidGenerator};
pub use manager::{ManagerStats, SessionManager, SessionManagerBuilder};
pub use reaper::{Reaper, ReaperStats};
pub use scheduler::{ExpirationEvent, ExpirationScheduler};
pub use store::{SessionData, SessionInfo, SessionRecord, SessionStore};
pub use timer::{Cancel, FireCallback, Timer, TimerHandle, TokioTimer};
