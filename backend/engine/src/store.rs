//! In-flight call session registry.
//!
//! The only shared mutable resource in the engine. The outer map is behind
//! an async RwLock; each session sits behind its own Mutex so mutations for
//! one `call_id` are serialized even when the provider retries a webhook
//! near-simultaneously, while unrelated calls never block one another.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use outdial_core::{CallId, CallSession};

pub type SessionHandle = Arc<Mutex<CallSession>>;

/// Concurrency-safe registry of in-flight call state, keyed by `call_id`.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<CallId, SessionHandle>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session, returning its handle.
    pub async fn insert(&self, session: CallSession) -> SessionHandle {
        let call_id = session.call_id.clone();
        let handle = Arc::new(Mutex::new(session));
        let mut w = self.sessions.write().await;
        w.insert(call_id, handle.clone());
        handle
    }

    /// Resolve a session by id. The map lock is released before the caller
    /// locks the session itself.
    pub async fn get(&self, call_id: &CallId) -> Option<SessionHandle> {
        let r = self.sessions.read().await;
        r.get(call_id).cloned()
    }

    pub async fn remove(&self, call_id: &CallId) -> Option<SessionHandle> {
        let mut w = self.sessions.write().await;
        let removed = w.remove(call_id);
        if removed.is_some() {
            debug!(call_id = %call_id, "Session removed from store");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Handles of every registered session, for sweeps and status reporting.
    pub async fn handles(&self) -> Vec<(CallId, SessionHandle)> {
        let r = self.sessions.read().await;
        r.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Point-in-time clones of all sessions.
    pub async fn snapshot(&self) -> Vec<CallSession> {
        let handles = self.handles().await;
        let mut out = Vec::with_capacity(handles.len());
        for (_, handle) in handles {
            out.push(handle.lock().await.clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outdial_core::{CallMessage, CallState, PhoneNumber};

    fn session(id: &str) -> CallSession {
        CallSession::new(
            CallId::new(id),
            PhoneNumber::new_unchecked("+15551234567"),
            CallMessage::default(),
        )
    }

    #[tokio::test]
    async fn insert_get_remove() {
        let store = SessionStore::new();
        store.insert(session("CA1")).await;
        assert_eq!(store.len().await, 1);

        let handle = store.get(&CallId::new("CA1")).await.unwrap();
        assert_eq!(handle.lock().await.state, CallState::Initiated);

        assert!(store.remove(&CallId::new("CA1")).await.is_some());
        assert!(store.get(&CallId::new("CA1")).await.is_none());
    }

    #[tokio::test]
    async fn per_call_mutation_is_serialized() {
        let store = SessionStore::new();
        store.insert(session("CA1")).await;

        // Two concurrent writers to the same session; both mutations land.
        let a = store.get(&CallId::new("CA1")).await.unwrap();
        let b = store.get(&CallId::new("CA1")).await.unwrap();
        let t1 = tokio::spawn(async move {
            let mut s = a.lock().await;
            s.apply(CallState::AwaitingAnswer).ok();
        });
        let t2 = tokio::spawn(async move {
            let mut s = b.lock().await;
            s.apply(CallState::AwaitingAnswer).ok();
        });
        t1.await.unwrap();
        t2.await.unwrap();

        let handle = store.get(&CallId::new("CA1")).await.unwrap();
        assert_eq!(handle.lock().await.state, CallState::AwaitingAnswer);
    }

    #[tokio::test]
    async fn snapshot_clones_all_sessions() {
        let store = SessionStore::new();
        store.insert(session("CA1")).await;
        store.insert(session("CA2")).await;
        let snap = store.snapshot().await;
        assert_eq!(snap.len(), 2);
    }
}
