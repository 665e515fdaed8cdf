#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use smartcity_assistant::conversation::Message;
use smartcity_assistant::gateway::{ChatGateway, GatewayError};
use tokio::sync::Notify;

/// Answers from a fixed script and records every history it was called with.
#[derive(Default)]
pub struct ScriptedGateway {
    replies: Mutex<VecDeque<Result<String, GatewayError>>>,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(self) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(GatewayError::Api {
                status: 503,
                body: "upstream unavailable".to_string(),
            }));
        self
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn seen(&self) -> Vec<Vec<Message>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatGateway for ScriptedGateway {
    async fn complete(&self, history: &[Message]) -> Result<String, GatewayError> {
        self.seen.lock().unwrap().push(history.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::MalformedResponse("script exhausted".to_string())))
    }
}

/// Holds every call open until `release` is notified.
pub struct GatedGateway {
    reply: String,
    calls: AtomicUsize,
    pub started: Notify,
    pub release: Notify,
}

impl GatedGateway {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
            started: Notify::new(),
            release: Notify::new(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatGateway for GatedGateway {
    async fn complete(&self, _history: &[Message]) -> Result<String, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        self.release.notified().await;
        Ok(self.reply.clone())
    }
}
