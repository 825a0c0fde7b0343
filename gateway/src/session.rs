//! # User Sessions
//!
//! Per-user conversation and usage state plus the registry that owns it.
//!
//! Each session sits behind its own async mutex. The registry is a
//! concurrent map, so looking up an existing user never contends with other
//! users, and only inserting a new user touches the map's shard lock.
//! Sessions are never evicted.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use gw_core::{Message, UserId};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::info;

#[derive(Debug)]
pub struct UserSession {
    pub(crate) history: Vec<Message>,
    pub(crate) request_timestamps: VecDeque<Instant>,
    token_usage: usize,
    pub(crate) compactions: u64,
    created_at: DateTime<Utc>
}

impl Default for UserSession {
    fn default() -> Self {
        Self::new()
    }
}

impl UserSession {
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            request_timestamps: VecDeque::new(),
            token_usage: 0,
            compactions: 0,
            created_at: Utc::now()
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn token_usage(&self) -> usize {
        self.token_usage
    }

    /// Usage only grows for the lifetime of the session.
    pub fn add_token_usage(&mut self, tokens: usize) -> usize {
        self.token_usage = self.token_usage.saturating_add(tokens);
        self.token_usage
    }

    pub fn request_timestamps(&self) -> &VecDeque<Instant> {
        &self.request_timestamps
    }

    pub fn request_timestamps_mut(&mut self) -> &mut VecDeque<Instant> {
        &mut self.request_timestamps
    }

    pub fn compactions(&self) -> u64 {
        self.compactions
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Point-in-time copy of a session for inspection.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub user_id: UserId,
    pub history: Vec<Message>,
    pub token_usage: usize,
    pub requests_in_window: usize,
    pub compactions: u64,
    pub created_at: DateTime<Utc>
}

pub type SharedSession = Arc<Mutex<UserSession>>;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<UserId, SharedSession>
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new()
        }
    }

    /// Returns the session for `user_id`, creating it on first use.
    pub fn get_or_create(&self, user_id: &UserId) -> SharedSession {
        if let Some(session) = self.sessions.get(user_id) {
            return Arc::clone(session.value());
        }

        let entry = self.sessions.entry(user_id.clone()).or_insert_with(|| {
            info!(user_id = %user_id, "Created user session");
            Arc::new(Mutex::new(UserSession::new()))
        });
        Arc::clone(entry.value())
    }

    pub fn get(&self, user_id: &UserId) -> Option<SharedSession> {
        self.sessions.get(user_id).map(|s| Arc::clone(s.value()))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub async fn snapshot(&self, user_id: &UserId) -> Option<SessionSnapshot> {
        let session = self.get(user_id)?;
        let guard = session.lock().await;
        Some(SessionSnapshot {
            user_id: user_id.clone(),
            history: guard.history.clone(),
            token_usage: guard.token_usage,
            requests_in_window: guard.request_timestamps.len(),
            compactions: guard.compactions,
            created_at: guard.created_at
        })
    }
}
