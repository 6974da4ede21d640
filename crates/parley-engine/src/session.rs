//! Call sessions and the store that owns them.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;

use parley_core::{CallId, Turn};

use crate::history::ConversationHistory;
use crate::ncco::Instruction;

/// Where a call is in its conversation. Diagnostic only; the controller
/// derives behavior from each event, not from this field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallPhase {
    Created,
    AwaitingInput,
    Responding,
    /// The farewell reply has been sent; waiting for the carrier's call-end.
    Closing,
}

/// Last keypad reply, kept to absorb duplicate deliveries of one keypress.
#[derive(Clone, Debug)]
pub struct ReplyRecord {
    pub utterance: String,
    pub instructions: Vec<Instruction>,
    pub at: Instant,
}

#[derive(Debug)]
pub struct Session {
    pub call_id: CallId,
    pub history: ConversationHistory,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub phase: CallPhase,
    pub last_dtmf: Option<ReplyRecord>,
}

impl Session {
    pub fn new(call_id: CallId, max_turns: usize) -> Self {
        let now = Utc::now();
        Self {
            call_id,
            history: ConversationHistory::new(max_turns),
            created_at: now,
            last_activity_at: now,
            phase: CallPhase::Created,
            last_dtmf: None,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity_at = Utc::now();
    }

    /// Instructions previously sent for the same keypress, if it arrived
    /// again within `window`.
    pub fn replay_dtmf(&self, utterance: &str, window: Duration) -> Option<Vec<Instruction>> {
        self.last_dtmf
            .as_ref()
            .filter(|r| r.utterance == utterance && r.at.elapsed() <= window)
            .map(|r| r.instructions.clone())
    }

    pub fn remember_dtmf(&mut self, utterance: String, instructions: Vec<Instruction>) {
        self.last_dtmf = Some(ReplyRecord {
            utterance,
            instructions,
            at: Instant::now(),
        });
    }
}

pub type SessionHandle = Arc<Mutex<Session>>;

/// Concurrency-safe map of live calls.
///
/// Map-level operations only take a shard lock for the duration of the
/// lookup; per-call serialization is the job of each session's own mutex.
pub struct SessionStore {
    sessions: DashMap<CallId, SessionHandle>,
    max_turns: usize,
}

impl SessionStore {
    pub fn new(max_turns: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            max_turns,
        }
    }

    /// Return the session for `call_id`, creating an empty one if absent.
    /// The flag reports whether a session was created.
    pub fn get_or_create(&self, call_id: &CallId) -> (SessionHandle, bool) {
        match self.sessions.entry(call_id.clone()) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let handle = Arc::new(Mutex::new(Session::new(call_id.clone(), self.max_turns)));
                entry.insert(Arc::clone(&handle));
                (handle, true)
            }
        }
    }

    /// Lock the live session for `call_id`, creating it if absent. If the
    /// session was evicted or deleted while waiting for the lock, the wait
    /// restarts on the session now in the store. The flag reports whether
    /// a session was created.
    pub async fn lock(&self, call_id: &CallId) -> (OwnedMutexGuard<Session>, bool) {
        let mut created_any = false;
        loop {
            let (handle, created) = self.get_or_create(call_id);
            created_any |= created;
            let guard = Arc::clone(&handle).lock_owned().await;
            if self.is_current(call_id, &handle) {
                return (guard, created_any);
            }
            tracing::debug!(call_id = %call_id, "session replaced while waiting, retrying");
        }
    }

    fn is_current(&self, call_id: &CallId, handle: &SessionHandle) -> bool {
        self.sessions
            .get(call_id)
            .is_some_and(|e| Arc::ptr_eq(e.value(), handle))
    }

    pub fn get(&self, call_id: &CallId) -> Option<SessionHandle> {
        self.sessions.get(call_id).map(|e| Arc::clone(e.value()))
    }

    /// Remove a session. Deleting an absent call is a no-op; the return
    /// value only reports whether anything was removed.
    pub fn delete(&self, call_id: &CallId) -> bool {
        self.sessions.remove(call_id).is_some()
    }

    /// Copy of a call's history; empty for unknown calls.
    pub async fn snapshot_history(&self, call_id: &CallId) -> Vec<Turn> {
        match self.get(call_id) {
            Some(handle) => handle.lock().await.history.snapshot(),
            None => Vec::new(),
        }
    }

    pub fn contains(&self, call_id: &CallId) -> bool {
        self.sessions.contains_key(call_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop sessions idle for longer than `max_idle`. Sessions currently
    /// locked by an in-flight event are skipped.
    pub fn evict_idle(&self, max_idle: chrono::Duration) -> usize {
        let now = Utc::now();
        let mut removed = 0;
        self.sessions.retain(|call_id, handle| {
            let Ok(session) = handle.try_lock() else {
                return true;
            };
            let keep = now - session.last_activity_at <= max_idle;
            if !keep {
                removed += 1;
                tracing::info!(call_id = %call_id, "evicted idle call session");
            }
            keep
        });
        removed
    }
}
