// src/message.rs
use serde::{Deserialize, Serialize};

use crate::conversation::{ChatState, Message};

#[derive(Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub reply: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: String,
    /// `sending` while a reply is pending; the widget disables input then.
    pub state: ChatState,
    pub messages: Vec<Message>,
}
