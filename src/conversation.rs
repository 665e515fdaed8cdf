// src/conversation.rs
//! One visitor's chat with the city assistant.
//!
//! A [`Conversation`] is either `Idle` or `Sending`. Submitting text appends
//! the user turn right away and hands back the history to send; settling the
//! gateway result appends exactly one assistant turn and returns to `Idle`.
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::gateway::{ChatGateway, GatewayError};

/// Reply shown to the visitor when the assistant call fails.
pub const APOLOGY: &str =
    "Maaf, terjadi kesalahan saat menghubungi asisten. Silakan coba lagi nanti.";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Milliseconds since the Unix epoch, strictly increasing within a conversation.
    pub id: u64,
    pub role: MessageRole,
    pub text: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatState {
    #[default]
    Idle,
    Sending,
}

/// How a pending request settled. `Failed` is the transient error step:
/// the conversation is already back in `Idle` when it is reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Replied,
    Failed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Message cannot be empty")]
    EmptyMessage,
    #[error("A reply is still pending")]
    Busy,
}

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Identifies one pending request. Tokens are never reused, so a result can
/// only settle the request it was issued for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestToken(u64);

impl RequestToken {
    fn next() -> Self {
        RequestToken(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

/// What `begin_submit` hands to the caller: the token to settle with and the
/// history to send.
#[derive(Clone, Debug)]
pub struct PendingRequest {
    pub token: RequestToken,
    pub history: Vec<Message>,
}

#[derive(Clone, Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    pending: Option<RequestToken>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn state(&self) -> ChatState {
        match self.pending {
            Some(_) => ChatState::Sending,
            None => ChatState::Idle,
        }
    }

    pub fn has_started(&self) -> bool {
        !self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append the user turn and move to `Sending`.
    ///
    /// Blank text and submissions while a reply is pending leave the
    /// conversation untouched.
    pub fn begin_submit(&mut self, text: &str) -> Result<PendingRequest, SubmitError> {
        if self.pending.is_some() {
            return Err(SubmitError::Busy);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SubmitError::EmptyMessage);
        }

        self.push(MessageRole::User, text);
        let token = RequestToken::next();
        self.pending = Some(token);
        Ok(PendingRequest {
            token,
            history: self.messages.clone(),
        })
    }

    /// Apply the gateway result of the request identified by `token`.
    ///
    /// Returns `None` when `token` is not the pending request (the
    /// conversation was reset, possibly with a newer request in flight);
    /// the result is then dropped.
    pub fn settle(
        &mut self,
        token: RequestToken,
        result: Result<String, GatewayError>,
    ) -> Option<Outcome> {
        if self.pending != Some(token) {
            return None;
        }
        Some(self.finish(result))
    }

    /// Submit, await the gateway, and settle in one step.
    ///
    /// The exclusive borrow spans the await, so one owner can never have two
    /// requests in flight.
    pub async fn submit<G>(&mut self, gateway: &G, text: &str) -> Result<Outcome, SubmitError>
    where
        G: ChatGateway + ?Sized,
    {
        let request = self.begin_submit(text)?;
        let result = gateway.complete(&request.history).await;
        Ok(self.finish(result))
    }

    /// Drop every turn, as a page reload would.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.pending = None;
    }

    fn finish(&mut self, result: Result<String, GatewayError>) -> Outcome {
        self.pending = None;
        match result {
            Ok(reply) => {
                self.push(MessageRole::Assistant, reply);
                Outcome::Replied
            }
            Err(err) => {
                error!(error = %err, "assistant call failed");
                self.push(MessageRole::Assistant, APOLOGY);
                Outcome::Failed
            }
        }
    }

    fn push(&mut self, role: MessageRole, text: impl Into<String>) {
        let id = self.next_id();
        self.messages.push(Message {
            id,
            role,
            text: text.into(),
        });
    }

    fn next_id(&self) -> u64 {
        let now = now_millis();
        match self.messages.last() {
            Some(last) if now <= last.id => last.id + 1,
            _ => now,
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
