//! Expiration vs. update races.
//!
//! These tests drive the manager with a hand-fired timer so an old
//! version's expiration can be delivered at exactly the wrong moment,
//! including after it was cancelled.

use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, Waker};

use lapse_session::{
    Cancel, FireCallback, SessionConfig, SessionData, SessionManager, Timer, TimerHandle,
};
use parking_lot::Mutex;
use serde_json::json;

#[derive(Debug, Default)]
struct ManualCancel {
    finished: Arc<AtomicBool>,
}

impl Cancel for ManualCancel {
    fn cancel(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

/// Timer whose callbacks only run when a test fires them.
///
/// Firing ignores cancellation on purpose: it models a timer that went
/// off just before `cancel` reached it.
#[derive(Clone, Default)]
struct ManualTimer {
    armed: Arc<Mutex<Vec<Option<FireCallback>>>>,
}

impl ManualTimer {
    fn armed(&self) -> usize {
        self.armed.lock().len()
    }

    fn fire(&self, index: usize) {
        let callback = self.armed.lock()[index].take();
        if let Some(callback) = callback {
            callback();
        }
    }
}

impl Timer for ManualTimer {
    fn after(&self, _delay: std::time::Duration, on_fire: FireCallback) -> TimerHandle {
        self.armed.lock().push(Some(on_fire));
        TimerHandle::new(ManualCancel::default())
    }
}

fn manager(timer: &ManualTimer) -> SessionManager {
    SessionManager::builder(SessionConfig::default())
        .timer(timer.clone())
        .build()
        .unwrap()
}

fn value(v: &str) -> SessionData {
    SessionData::from([("k".to_string(), json!(v))])
}

#[tokio::test]
async fn test_stale_fire_before_update_commits() {
    let timer = ManualTimer::default();
    let manager = manager(&timer);
    let id = manager.create_session().unwrap();

    // Version 0 fires, but the update lands before the reaper runs.
    timer.fire(0);
    manager.update_session_data(&id, value("v")).unwrap();

    manager.shutdown().await;

    assert_eq!(*manager.get_session_data(&id).unwrap(), value("v"));
    let stats = manager.stats();
    assert_eq!(stats.stale_events, 1);
    assert_eq!(stats.expired, 0);
}

#[tokio::test]
async fn test_cancelled_timer_firing_late_is_ignored() {
    let timer = ManualTimer::default();
    let manager = manager(&timer);
    let id = manager.create_session().unwrap();

    manager.update_session_data(&id, value("v")).unwrap();
    assert_eq!(timer.armed(), 2);

    // The cancelled version-0 timer fires anyway.
    timer.fire(0);
    manager.shutdown().await;

    assert_eq!(*manager.get_session_data(&id).unwrap(), value("v"));
    assert_eq!(manager.session_info(&id).unwrap().version, 1);
}

#[tokio::test]
async fn test_current_version_fire_expires() {
    let timer = ManualTimer::default();
    let manager = manager(&timer);
    let id = manager.create_session().unwrap();
    manager.update_session_data(&id, value("v")).unwrap();

    timer.fire(1);
    manager.shutdown().await;

    assert!(manager.get_session_data(&id).is_err());
    assert_eq!(manager.stats().expired, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_superseded_fires_never_delete() {
    const UPDATES: usize = 2_000;

    let timer = ManualTimer::default();
    let manager = Arc::new(manager(&timer));
    let id = manager.create_session().unwrap();
    let done = Arc::new(AtomicBool::new(false));

    // Keep firing every timer that already has a successor armed.
    let firer = {
        let timer = timer.clone();
        let done = Arc::clone(&done);
        std::thread::spawn(move || {
            while !done.load(Ordering::SeqCst) {
                let superseded = timer.armed().saturating_sub(1);
                for index in 0..superseded {
                    timer.fire(index);
                }
                std::thread::yield_now();
            }
        })
    };

    let updater = {
        let manager = Arc::clone(&manager);
        let id = id.clone();
        tokio::task::spawn_blocking(move || {
            for i in 0..UPDATES {
                manager
                    .update_session_data(&id, value(&i.to_string()))
                    .unwrap();
            }
        })
    };

    updater.await.unwrap();
    done.store(true, Ordering::SeqCst);
    firer.join().unwrap();

    // Deliver whatever is left except the live timer, then drain.
    for index in 0..timer.armed() - 1 {
        timer.fire(index);
    }
    manager.shutdown().await;

    let info = manager.session_info(&id).unwrap();
    assert_eq!(info.version, UPDATES as u64);
    assert_eq!(
        *manager.get_session_data(&id).unwrap(),
        value(&(UPDATES - 1).to_string())
    );
    assert_eq!(manager.stats().expired, 0);
    assert_eq!(manager.stats().stale_events, UPDATES as u64);
}

#[tokio::test]
async fn test_second_shutdown_waits_for_drain() {
    const UPDATES: usize = 10;

    let timer = ManualTimer::default();
    let manager = manager(&timer);
    let id = manager.create_session().unwrap();
    for i in 0..UPDATES {
        manager.update_session_data(&id, value(&i.to_string())).unwrap();
    }
    for index in 0..UPDATES {
        timer.fire(index);
    }

    // On this single-threaded runtime the reaper cannot run until the
    // test yields, so the first shutdown is still waiting on the drain.
    let mut first = pin!(manager.shutdown());
    let mut cx = Context::from_waker(Waker::noop());
    assert!(matches!(first.as_mut().poll(&mut cx), Poll::Pending));

    manager.shutdown().await;
    assert_eq!(manager.stats().stale_events, UPDATES as u64);
    assert_eq!(manager.stats().expired, 0);

    first.await;
    assert_eq!(manager.session_info(&id).unwrap().version, UPDATES as u64);
}
