use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

struct Session {
    user_id: i64,
    issued_at: Instant,
}

/// In-process table of opaque bearer tokens.
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    pub fn issue(&self, user_id: i64) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.sessions.insert(
            token.clone(),
            Session {
                user_id,
                issued_at: Instant::now(),
            },
        );
        token
    }

    /// User id behind a live token. Expired tokens are dropped on lookup.
    pub fn resolve(&self, token: &str) -> Option<i64> {
        let (user_id, expired) = {
            let session = self.sessions.get(token)?;
            (session.user_id, session.issued_at.elapsed() >= self.ttl)
        };

        if expired {
            self.sessions.remove(token);
            return None;
        }
        Some(user_id)
    }

    /// Remove every expired token; returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| session.issued_at.elapsed() < self.ttl);
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
