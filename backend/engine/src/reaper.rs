//! Session reaper — the engine's only background task.
//!
//! Calls that never receive a terminal callback would otherwise sit in the
//! store forever. The reaper periodically fails sessions idle past the
//! inactivity window and evicts terminal sessions past the retention
//! window.

use std::time::Duration;

use chrono::Utc;
use tokio::time;
use tracing::{debug, info, warn};

use outdial_core::CallState;

use crate::store::SessionStore;

#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// How often to sweep.
    pub sweep_interval: Duration,
    /// Non-terminal sessions idle longer than this are failed.
    pub inactivity_secs: i64,
    /// Terminal sessions older than this are evicted.
    pub retention_secs: i64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(30),
            inactivity_secs: 300,
            retention_secs: 3600,
        }
    }
}

pub struct SessionReaper {
    store: SessionStore,
    config: ReaperConfig,
}

impl SessionReaper {
    pub fn new(store: SessionStore, config: ReaperConfig) -> Self {
        Self { store, config }
    }

    /// Run forever; spawn on the runtime at startup.
    pub async fn run(self) {
        let mut ticker = time::interval(self.config.sweep_interval);
        info!(
            inactivity_secs = self.config.inactivity_secs,
            retention_secs = self.config.retention_secs,
            "Session reaper started"
        );
        loop {
            ticker.tick().await;
            let (failed, removed) = self.sweep().await;
            if failed > 0 || removed > 0 {
                info!(failed, removed, "Reaper sweep finished");
            }
        }
    }

    /// One sweep pass. Returns (sessions failed, sessions evicted).
    pub async fn sweep(&self) -> (usize, usize) {
        let now = Utc::now();
        let mut failed = 0usize;
        let mut evict = Vec::new();

        for (call_id, handle) in self.store.handles().await {
            let mut session = handle.lock().await;
            let idle_secs = (now - session.updated_at).num_seconds();

            if session.state.is_terminal() {
                if idle_secs > self.config.retention_secs {
                    evict.push(call_id);
                }
            } else if idle_secs > self.config.inactivity_secs {
                warn!(
                    call_id = %session.call_id,
                    state = %session.state,
                    idle_secs,
                    "No terminal callback within the inactivity window, failing session"
                );
                if session.apply(CallState::Failed).is_ok() {
                    failed += 1;
                }
            }
        }

        let removed = evict.len();
        for call_id in evict {
            debug!(call_id = %call_id, "Evicting expired terminal session");
            self.store.remove(&call_id).await;
        }
        (failed, removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use outdial_core::{CallId, CallMessage, CallSession, PhoneNumber};

    fn config() -> ReaperConfig {
        ReaperConfig {
            sweep_interval: Duration::from_secs(1),
            inactivity_secs: 60,
            retention_secs: 600,
        }
    }

    fn session(id: &str) -> CallSession {
        CallSession::new(
            CallId::new(id),
            PhoneNumber::new_unchecked("+15551234567"),
            CallMessage::default(),
        )
    }

    async fn backdate(store: &SessionStore, id: &str, secs: i64) {
        let handle = store.get(&CallId::new(id)).await.unwrap();
        let mut s = handle.lock().await;
        s.updated_at = Utc::now() - ChronoDuration::seconds(secs);
    }

    #[tokio::test]
    async fn idle_session_is_failed() {
        let store = SessionStore::new();
        store.insert(session("CA1")).await;
        backdate(&store, "CA1", 120).await;

        let reaper = SessionReaper::new(store.clone(), config());
        let (failed, removed) = reaper.sweep().await;
        assert_eq!((failed, removed), (1, 0));

        let handle = store.get(&CallId::new("CA1")).await.unwrap();
        assert_eq!(handle.lock().await.state, CallState::Failed);
    }

    #[tokio::test]
    async fn active_session_is_left_alone() {
        let store = SessionStore::new();
        store.insert(session("CA1")).await;

        let reaper = SessionReaper::new(store.clone(), config());
        let (failed, removed) = reaper.sweep().await;
        assert_eq!((failed, removed), (0, 0));
        assert_eq!(
            store.get(&CallId::new("CA1")).await.unwrap().lock().await.state,
            CallState::Initiated
        );
    }

    #[tokio::test]
    async fn expired_terminal_session_is_evicted() {
        let store = SessionStore::new();
        store.insert(session("CA1")).await;
        {
            let handle = store.get(&CallId::new("CA1")).await.unwrap();
            handle.lock().await.apply(CallState::Failed).unwrap();
        }
        backdate(&store, "CA1", 1200).await;

        let reaper = SessionReaper::new(store.clone(), config());
        let (failed, removed) = reaper.sweep().await;
        assert_eq!((failed, removed), (0, 1));
        assert!(store.get(&CallId::new("CA1")).await.is_none());
    }

    #[tokio::test]
    async fn fresh_terminal_session_is_retained() {
        let store = SessionStore::new();
        store.insert(session("CA1")).await;
        {
            let handle = store.get(&CallId::new("CA1")).await.unwrap();
            handle.lock().await.apply(CallState::Completed).unwrap();
        }

        let reaper = SessionReaper::new(store.clone(), config());
        let (_, removed) = reaper.sweep().await;
        assert_eq!(removed, 0);
        assert!(store.get(&CallId::new("CA1")).await.is_some());
    }
}
