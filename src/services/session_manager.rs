// src/services/session_manager.rs
use std::{
    collections::HashMap,
    fmt::Debug,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::{sync::RwLock, task::JoinHandle};
use tracing::debug;
use uuid::Uuid;

use crate::conversation::{
    APOLOGY, ChatState, Conversation, Message, Outcome, RequestToken, SubmitError,
};
use crate::gateway::{ChatGateway, GatewayError};

#[derive(Clone, Debug)]
pub struct Session {
    pub id: String,
    pub conversation: Conversation,
    pub last_active: Instant,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            conversation: Conversation::new(),
            last_active: Instant::now(),
        }
    }
}

/// Result of one chat turn.
#[derive(Clone, Debug)]
pub struct Turn {
    pub reply: String,
    /// `None` when the session was reset or dropped before the reply arrived.
    pub outcome: Option<Outcome>,
    pub messages: Vec<Message>,
}

#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<RwLock<HashMap<String, Session>>>,
    ttl: Duration,
}

impl Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    // Create a fresh session and return its id.
    pub async fn create_session(&self) -> String {
        let id = Uuid::new_v4().to_string();
        let session = Session::new(id.clone());

        let mut guard = self.inner.write().await;
        guard.insert(id.clone(), session);
        id
    }

    // Ensure there's a session with this id.
    pub async fn ensure_session(&self, id: &str) -> String {
        {
            let guard = self.inner.read().await;
            if guard.contains_key(id) {
                return id.to_string();
            }
        }
        let mut guard = self.inner.write().await;
        guard
            .entry(id.to_string())
            .or_insert_with(|| Session::new(id));
        id.to_string()
    }

    /// Run one chat turn for a session.
    ///
    /// The session lock is held only to begin and to settle, never across the
    /// gateway call. A second submit while the first is pending is rejected
    /// with [`SubmitError::Busy`] and issues no call. The call and its settle
    /// run on their own task, so the turn completes even if the caller stops
    /// waiting for it.
    pub async fn submit(
        &self,
        session_id: &str,
        text: &str,
        gateway: Arc<dyn ChatGateway>,
    ) -> Result<Turn, SubmitError> {
        let request = {
            let mut guard = self.inner.write().await;
            let session = guard
                .entry(session_id.to_string())
                .or_insert_with(|| Session::new(session_id));
            session.last_active = Instant::now();
            session.conversation.begin_submit(text)?
        };
        let token = request.token;

        let manager = self.clone();
        let id = session_id.to_string();
        let task = tokio::spawn(async move {
            let result = gateway.complete(&request.history).await;
            manager.settle(&id, request.token, result).await
        });

        match task.await {
            Ok(turn) => Ok(turn),
            Err(err) => {
                let result = Err(GatewayError::Aborted(err.to_string()));
                Ok(self.settle(session_id, token, result).await)
            }
        }
    }

    async fn settle(
        &self,
        session_id: &str,
        token: RequestToken,
        result: Result<String, GatewayError>,
    ) -> Turn {
        let reply = match &result {
            Ok(reply) => reply.clone(),
            Err(_) => APOLOGY.to_string(),
        };

        let mut guard = self.inner.write().await;
        match guard.get_mut(session_id) {
            Some(session) => {
                let outcome = session.conversation.settle(token, result);
                if outcome.is_none() {
                    debug!(session_id, "dropping reply for a superseded request");
                }
                session.last_active = Instant::now();
                Turn {
                    reply,
                    outcome,
                    messages: session.conversation.messages().to_vec(),
                }
            }
            None => {
                debug!(session_id, "session removed while a reply was pending");
                Turn {
                    reply,
                    outcome: None,
                    messages: Vec::new(),
                }
            }
        }
    }

    /// Get a copy of the session history
    pub async fn get_history(&self, session_id: &str) -> Option<Vec<Message>> {
        let guard = self.inner.read().await;
        guard
            .get(session_id)
            .map(|s| s.conversation.messages().to_vec())
    }

    pub async fn get_state(&self, session_id: &str) -> Option<ChatState> {
        let guard = self.inner.read().await;
        guard.get(session_id).map(|s| s.conversation.state())
    }

    /// Clear a session's conversation. Returns false for unknown ids.
    pub async fn reset_session(&self, session_id: &str) -> bool {
        let mut guard = self.inner.write().await;
        match guard.get_mut(session_id) {
            Some(session) => {
                session.conversation.reset();
                session.last_active = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Remove a session by id
    pub async fn remove_session(&self, session_id: &str) -> bool {
        let mut guard = self.inner.write().await;
        guard.remove(session_id).is_some()
    }

    /// Remove sessions idle longer than ttl. Sessions awaiting a reply are kept.
    /// Returns number removed.
    pub async fn purge_expired(&self) -> usize {
        let mut guard = self.inner.write().await;
        let now = Instant::now();
        let before = guard.len();
        guard.retain(|_, s| {
            s.conversation.state() == ChatState::Sending
                || now.duration_since(s.last_active) < self.ttl
        });
        before - guard.len()
    }

    /// Purge expired sessions on a fixed interval until the runtime shuts down.
    pub fn spawn_purge_task(&self, every: Duration) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let removed = manager.purge_expired().await;
                if removed > 0 {
                    debug!(removed, "purged expired sessions");
                }
            }
        })
    }

    /// Number of sessions
    pub async fn len(&self) -> usize {
        let guard = self.inner.read().await;
        guard.len()
    }

    /// List session ids
    pub async fn list_session_ids(&self) -> Vec<String> {
        let guard = self.inner.read().await;
        guard.keys().cloned().collect()
    }
}
