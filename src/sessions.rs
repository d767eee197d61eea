//! Shared session registry for concurrent analyses.
//!
//! ## Design
//! - SessionStore: Arc<Mutex<HashMap<SessionKey, AnalysisSession>>>, shared
//!   across all connections
//! - A SessionKey pairs a client label with a per-analysis uuid, so one
//!   dashboard client can run several analyses without collisions
//! - Every operation degrades to a no-op (or None) when the session is
//!   missing; a stale key from a disconnected client must never panic

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use uuid::Uuid;

use crate::annotations::Annotation;
use crate::render::RenderSegment;
use crate::AnalysisSession;

/// Shared session store: (client, analysis id) → session.
pub type SessionStore = Arc<Mutex<HashMap<SessionKey, AnalysisSession>>>;

/// Identity of one running analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SessionKey {
    pub client: String,
    pub analysis: Uuid,
}

/// Counters for one session, safe to hand to presentation code.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub resolved: usize,
    pub dropped: usize,
    pub batches: usize,
    pub spans: usize,
}

/// Create a new empty SessionStore.
pub fn new_session_store() -> SessionStore {
    Arc::new(Mutex::new(HashMap::new()))
}

/// Register a fresh session for `client` over `source_text`, returning its
/// key.
pub fn create_session(store: &SessionStore, client: &str, source_text: &str) -> SessionKey {
    let key = SessionKey { client: client.to_string(), analysis: Uuid::new_v4() };
    let mut session = AnalysisSession::new(source_text);
    session.client_label = Some(client.to_string());
    if let Ok(mut guard) = store.lock() {
        guard.insert(key.clone(), session);
    }
    key
}

/// Feed one annotation batch to a session. Returns the re-rendered segment
/// list, or `None` if the key is unknown.
pub fn feed(store: &SessionStore, key: &SessionKey, batch: &[Annotation]) -> Option<Vec<RenderSegment>> {
    let mut guard = store.lock().ok()?;
    let session = guard.get_mut(key)?;
    Some(session.add_annotations(batch))
}

/// Clear a session's spans and counters for a fresh analysis pass.
pub fn reset_session(store: &SessionStore, key: &SessionKey) {
    if let Ok(mut guard) = store.lock() {
        if let Some(session) = guard.get_mut(key) {
            session.reset();
        }
    }
}

/// Drop a finished session, returning it so the caller can take a final
/// snapshot.
pub fn discard_session(store: &SessionStore, key: &SessionKey) -> Option<AnalysisSession> {
    let mut guard = store.lock().ok()?;
    guard.remove(key)
}

/// Snapshot a session's counters.
pub fn session_stats(store: &SessionStore, key: &SessionKey) -> Option<SessionStats> {
    let guard = store.lock().ok()?;
    let session = guard.get(key)?;
    Some(SessionStats {
        resolved: session.resolved_count(),
        dropped: session.dropped_count(),
        batches: session.batch_count(),
        spans: session.reconciled().len(),
    })
}

/// Keys of every live session, in no particular order.
pub fn live_sessions(store: &SessionStore) -> Vec<SessionKey> {
    if let Ok(guard) = store.lock() {
        return guard.keys().cloned().collect();
    }
    Vec::new()
}
