//! Per-browser selection state for the dashboard
//!
//! The dashboard allows at most one selected product per browser session.
//! Selecting drives the per-user drill-down and switches the metric tile
//! from totals to that product's numbers.
//!
//! ## Configuration
//!
//! - `DPUSAGE_MAX_SESSIONS`: Maximum sessions kept in memory (default: 10000)
//! - `DPUSAGE_SESSION_TTL_SECS`: Idle session TTL in seconds (default: 3600)
//!
//! ## Memory Bounds
//!
//! Once the store passes half its capacity, idle sessions are swept on
//! every write. At capacity the least recently used session is dropped.

use dashmap::DashMap;
use dpusage_core::validation::validate_session_id;
use dpusage_core::Result;
use serde::{Deserialize, Serialize};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::debug;

/// Default maximum number of sessions kept in memory
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Default TTL for idle sessions (1 hour)
pub const DEFAULT_SESSION_TTL_SECS: u64 = 3600;

/// Selection state of one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Full object name of the selected row
    pub selected: Option<String>,
}

impl SessionContext {
    /// Select `full_object_name`, or clear the selection if it is already
    /// the selected row. Returns the new selection.
    pub fn toggle(&mut self, full_object_name: &str) -> Option<&str> {
        if self.selected.as_deref() == Some(full_object_name) {
            self.selected = None;
        } else {
            self.selected = Some(full_object_name.to_string());
        }
        self.selected.as_deref()
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }
}

#[derive(Clone, Debug)]
struct SessionEntry {
    context: SessionContext,
    last_accessed: Instant,
}

/// Selection state for all sessions
pub struct SessionStore {
    sessions: Arc<DashMap<String, SessionEntry>>,
    max_sessions: usize,
    ttl: Duration,
}

impl Clone for SessionStore {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
            max_sessions: self.max_sessions,
            ttl: self.ttl,
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_SESSIONS,
            Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
        )
    }
}

impl SessionStore {
    pub fn new(max_sessions: usize, ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            max_sessions: max_sessions.max(1),
            ttl,
        }
    }

    /// Generate a fresh session identifier
    pub fn new_session_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Current selection of a session, if it is still live
    pub fn selection(&self, session_id: &str) -> Option<String> {
        let now = Instant::now();
        let mut entry = self.sessions.get_mut(session_id)?;
        if now.duration_since(entry.last_accessed) >= self.ttl {
            drop(entry);
            self.sessions.remove(session_id);
            return None;
        }
        entry.last_accessed = now;
        entry.context.selected.clone()
    }

    /// Toggle the selected row of a session, creating the session if needed
    pub fn toggle(&self, session_id: &str, full_object_name: &str) -> Result<Option<String>> {
        validate_session_id(session_id)?;
        let now = Instant::now();

        if !self.sessions.contains_key(session_id) {
            self.make_room(now);
        }

        let mut entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionEntry {
                context: SessionContext::default(),
                last_accessed: now,
            });

        if now.duration_since(entry.last_accessed) >= self.ttl {
            entry.context.clear();
        }
        entry.last_accessed = now;

        let selected = entry.context.toggle(full_object_name).map(str::to_string);
        debug!(session_id = %session_id, selected = ?selected, "Updated selection");

        Ok(selected)
    }

    /// Forget a session
    pub fn clear(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    fn make_room(&self, now: Instant) {
        let threshold = self.max_sessions / 2;
        if self.sessions.len() > threshold {
            let ttl = self.ttl;
            self.sessions
                .retain(|_, entry| now.duration_since(entry.last_accessed) < ttl);
        }

        if self.sessions.len() >= self.max_sessions {
            let oldest = self
                .sessions
                .iter()
                .min_by_key(|entry| entry.value().last_accessed)
                .map(|entry| entry.key().clone());
            if let Some(key) = oldest {
                debug!(session_id = %key, "Evicting least recently used session");
                self.sessions.remove(&key);
            }
        }
    }
}
