//! Short-lived session records with per-entry expiry.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use vidi_common::{Error, Result, Session, SessionId};

/// Keyed session cache.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a live session; expired or unknown ids are `NotFound`.
    async fn get(&self, id: &SessionId) -> Result<Session>;

    /// Insert or replace a session living for `ttl`.
    async fn set(&self, session: Session, ttl: Duration) -> Result<()>;

    async fn delete(&self, id: &SessionId) -> Result<()>;

    /// Push the expiry of a live session to `ttl` from now.
    async fn expire(&self, id: &SessionId, ttl: Duration) -> Result<()>;
}

struct Entry {
    session: Session,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-process session store. Expired entries are dropped when next touched.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    entries: Arc<DashMap<SessionId, Entry>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before - self.entries.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &SessionId) -> Result<Session> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(id) {
            if entry.is_live(now) {
                return Ok(entry.session.clone());
            }
        }
        // Drop it outside the read guard.
        self.entries.remove_if(id, |_, entry| !entry.is_live(now));
        Err(Error::not_found("session", id))
    }

    async fn set(&self, session: Session, ttl: Duration) -> Result<()> {
        let entry = Entry {
            expires_at: Instant::now() + ttl,
            session,
        };
        self.entries.insert(entry.session.id, entry);
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<()> {
        self.entries.remove(id);
        Ok(())
    }

    async fn expire(&self, id: &SessionId, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        match self.entries.get_mut(id) {
            Some(mut entry) if entry.is_live(now) => {
                entry.expires_at = now + ttl;
                Ok(())
            }
            _ => Err(Error::not_found("session", id)),
        }
    }
}
