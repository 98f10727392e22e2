//! Per-session request bookkeeping.
//!
//! A session may have at most one generation in flight. Each accepted
//! submission gets a [`RequestToken`]; its result is only handed back if the
//! token is still the session's current request when the generation finishes.
//! Dropping a token without completing it (e.g. the client went away) frees
//! the session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("a simulation is already running for session `{0}`")]
pub struct SessionBusy(pub String);

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    in_flight: HashMap<String, u64>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    inner: Arc<Mutex<Inner>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn begin(&self, session: &str) -> Result<RequestToken, SessionBusy> {
        let mut inner = self.lock();
        if inner.in_flight.contains_key(session) {
            return Err(SessionBusy(session.to_string()));
        }
        inner.next_id += 1;
        let id = inner.next_id;
        inner.in_flight.insert(session.to_string(), id);
        debug!(session, id, "generation started");

        Ok(RequestToken {
            tracker: self.clone(),
            session: session.to_string(),
            id,
            settled: false,
        })
    }

    /// Forgets the session's current request. Returns whether one was pending.
    pub fn reset(&self, session: &str) -> bool {
        let cleared = self.lock().in_flight.remove(session).is_some();
        debug!(session, cleared, "session reset");
        cleared
    }

    pub fn is_busy(&self, session: &str) -> bool {
        self.lock().in_flight.contains_key(session)
    }

    /// Clears the entry if `id` is still current; reports whether it was.
    fn release(&self, session: &str, id: u64) -> bool {
        let mut inner = self.lock();
        if inner.in_flight.get(session) == Some(&id) {
            inner.in_flight.remove(session);
            true
        } else {
            false
        }
    }
}

#[derive(Debug)]
pub struct RequestToken {
    tracker: SessionTracker,
    session: String,
    id: u64,
    settled: bool,
}

impl RequestToken {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Hands `value` back if this request is still current, `None` if it went
    /// stale (the session was reset while it ran).
    pub fn complete<T>(mut self, value: T) -> Option<T> {
        self.settled = true;
        if self.tracker.release(&self.session, self.id) {
            Some(value)
        } else {
            debug!(session = %self.session, id = self.id, "discarding stale result");
            None
        }
    }
}

impl Drop for RequestToken {
    fn drop(&mut self) {
        if !self.settled {
            self.tracker.release(&self.session, self.id);
        }
    }
}
