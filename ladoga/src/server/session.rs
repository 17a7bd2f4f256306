//! Per-session identity and state

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Key under which the negotiated protocol version is stored in the session data bag
pub(crate) const PROTOCOL_VERSION_KEY: &str = "protocolVersion";

/// An identity binding a sequence of interactions to shared server-side state.
///
/// The data bag and activity timestamp are guarded by the session's own lock
/// so the store's outer lock is never held during handler work.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    last_activity: Mutex<Instant>,
    data: Mutex<HashMap<String, Value>>,
    initialized: AtomicBool,
}

impl Session {
    pub(crate) fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            last_activity: Mutex::new(Instant::now()),
            data: Mutex::new(HashMap::new()),
            initialized: AtomicBool::new(false),
        }
    }

    /// The session id: unique for the server's lifetime, case-sensitive printable ASCII
    #[inline]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The moment the session was created
    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Bumps the activity timestamp; called on every successful
    /// request or notification handled for this session
    pub(crate) fn touch(&self) {
        let mut last = self.last_activity
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *last = Instant::now();
    }

    pub(crate) fn is_expired(&self, ttl: Duration) -> bool {
        let last = self.last_activity
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        last.elapsed() > ttl
    }

    /// Whether `notifications/initialized` has been received
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub(crate) fn set_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    /// Reads a value from the session's key/value bag
    pub fn value(&self, key: &str) -> Option<Value> {
        self.data
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Stores a value in the session's key/value bag
    pub fn set_value(&self, key: &str, value: Value) {
        self.data
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.into(), value);
    }

    /// The protocol version negotiated during `initialize`, if any
    pub fn protocol_ver(&self) -> Option<String> {
        match self.value(PROTOCOL_VERSION_KEY) {
            Some(Value::String(ver)) => Some(ver),
            _ => None,
        }
    }
}

/// In-memory session store with expiry sweep and a termination event feed.
pub(crate) struct SessionStore {
    sessions: DashMap<Uuid, Arc<Session>>,
    terminated_tx: broadcast::Sender<Uuid>,
}

impl Default for SessionStore {
    fn default() -> Self {
        let (terminated_tx, _) = broadcast::channel(64);
        Self {
            sessions: DashMap::new(),
            terminated_tx,
        }
    }
}

impl SessionStore {
    pub(crate) fn new() -> Self {
        Default::default()
    }

    /// Creates and stores a new session
    pub(crate) fn create(&self) -> Arc<Session> {
        let session = Arc::new(Session::new());
        self.sessions.insert(session.id(), session.clone());
        session
    }

    /// Looks up a session and bumps its activity timestamp on hit
    pub(crate) fn lookup(&self, id: &Uuid) -> Option<Arc<Session>> {
        let session = self.sessions.get(id).map(|s| s.clone())?;
        session.touch();
        Some(session)
    }

    /// Removes a session. Terminated sessions are unrecoverable.
    pub(crate) fn terminate(&self, id: &Uuid) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            let _ = self.terminated_tx.send(*id);
        }
        removed
    }

    /// Ids of every live session
    pub(crate) fn list_active(&self) -> Vec<Uuid> {
        self.sessions
            .iter()
            .map(|entry| *entry.key())
            .collect()
    }

    /// Subscribes to session-terminated events
    pub(crate) fn subscribe_terminated(&self) -> broadcast::Receiver<Uuid> {
        self.terminated_tx.subscribe()
    }

    /// Removes every session idle past `ttl`, returning how many were swept
    pub(crate) fn sweep(&self, ttl: Duration) -> usize {
        let expired: Vec<Uuid> = self.sessions
            .iter()
            .filter(|entry| entry.value().is_expired(ttl))
            .map(|entry| *entry.key())
            .collect();
        let count = expired.len();
        for id in expired {
            if self.terminate(&id) {
                tracing::debug!(logger = "ladoga", session_id = %id, "Session expired");
            }
        }
        count
    }

    /// Runs the background expiry sweep until `token` is cancelled
    pub(crate) async fn run_sweeper(self: Arc<Self>, ttl: Duration, token: CancellationToken) {
        let period = ttl
            .checked_div(2)
            .unwrap_or(Duration::from_secs(30))
            .max(Duration::from_secs(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    self.sweep(ttl);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_creates_and_looks_up_sessions() {
        let store = SessionStore::new();

        let session = store.create();
        let found = store.lookup(&session.id()).unwrap();

        assert_eq!(found.id(), session.id());
        assert!(store.list_active().contains(&session.id()));
    }

    #[test]
    fn it_terminates_sessions_irrecoverably() {
        let store = SessionStore::new();
        let session = store.create();

        assert!(store.terminate(&session.id()));
        assert!(store.lookup(&session.id()).is_none());
        assert!(!store.terminate(&session.id()), "A second terminate is a no-op");
    }

    #[test]
    fn it_emits_termination_events() {
        let store = SessionStore::new();
        let session = store.create();
        let mut events = store.subscribe_terminated();

        store.terminate(&session.id());

        assert_eq!(events.try_recv().unwrap(), session.id());
    }

    #[test]
    fn it_sweeps_only_expired_sessions() {
        let store = SessionStore::new();
        let stale = store.create();
        let fresh = store.create();

        // Backdate the stale session far enough to expire
        {
            let mut last = stale.last_activity.lock().unwrap();
            *last = Instant::now() - Duration::from_secs(120);
        }

        let swept = store.sweep(Duration::from_secs(60));

        assert_eq!(swept, 1);
        assert!(store.lookup(&stale.id()).is_none());
        assert!(store.lookup(&fresh.id()).is_some());
    }

    #[test]
    fn it_bumps_activity_on_lookup() {
        let store = SessionStore::new();
        let session = store.create();
        {
            let mut last = session.last_activity.lock().unwrap();
            *last = Instant::now() - Duration::from_secs(120);
        }

        store.lookup(&session.id()).unwrap();

        assert!(!session.is_expired(Duration::from_secs(60)));
    }

    #[test]
    fn it_keeps_session_values() {
        let session = Session::new();

        session.set_value("protocolVersion", serde_json::json!("2025-03-26"));

        assert_eq!(session.protocol_ver().as_deref(), Some("2025-03-26"));
        assert_eq!(session.value("missing"), None);
    }

    #[test]
    fn it_flips_initialized_once() {
        let session = Session::new();

        assert!(!session.is_initialized());
        session.set_initialized();
        assert!(session.is_initialized());
    }
}
