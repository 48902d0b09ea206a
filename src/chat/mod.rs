//! # Chat assistant
//! Session state for the dashboard's AI panel plus the request builder for
//! the hosted completion endpoint.
//!
//! A request is: the configured system prompt, an optional second system
//! message carrying the dashboard context as pretty JSON, the last
//! [`HISTORY_WINDOW`] prior messages, then the new user message.

pub mod provider;

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::settings::AiSettings;
pub use provider::{ChatProvider, MockChatProvider, OpenAiChatProvider};

pub const HISTORY_WINDOW: usize = 10;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("chat_requests_total", "Chat completions requested.");
        describe_counter!("chat_errors_total", "Chat messages that ended in an error.");
    });
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("Please set your OpenAI API Key in Settings.")]
    MissingApiKey,
    #[error("Message cannot be empty.")]
    EmptyMessage,
    /// Provider answered with a non-OK status.
    #[error("{0}")]
    Api(String),
    #[error("{0}")]
    Connection(String),
}

impl ChatError {
    pub fn connection(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        if msg.trim().is_empty() {
            ChatError::Connection("Connection error".into())
        } else {
            ChatError::Connection(msg)
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ChatError::MissingApiKey => "missing_api_key",
            ChatError::EmptyMessage => "empty_message",
            ChatError::Api(_) => "api",
            ChatError::Connection(_) => "connection",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>, at: DateTime<Utc>, id_offset_ms: i64) -> Self {
        Self {
            id: (at.timestamp_millis() + id_offset_ms).to_string(),
            role,
            content: content.into(),
            timestamp: at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub is_open: bool,
    pub messages: Vec<ChatMessage>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl ChatSession {
    pub fn toggle(&mut self) -> bool {
        self.is_open = !self.is_open;
        self.is_open
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Appending a message clears any pending error.
    pub fn push(&mut self, msg: ChatMessage) {
        self.messages.push(msg);
        self.error = None;
    }

    pub fn set_error(&mut self, err: &ChatError) {
        self.error = Some(err.to_string());
        self.is_loading = false;
    }

    fn recent(&self) -> Vec<ChatMessage> {
        let skip = self.messages.len().saturating_sub(HISTORY_WINDOW);
        self.messages[skip..].to_vec()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

pub fn build_request(
    settings: &AiSettings,
    history: &[ChatMessage],
    message: &str,
    context: Option<&Value>,
) -> ChatRequest {
    let mut messages = Vec::with_capacity(history.len().min(HISTORY_WINDOW) + 3);
    messages.push(WireMessage {
        role: Role::System,
        content: settings.system_prompt.clone(),
    });
    if let Some(ctx) = context.filter(|c| !c.is_null()) {
        let pretty = serde_json::to_string_pretty(ctx).unwrap_or_else(|_| ctx.to_string());
        messages.push(WireMessage {
            role: Role::System,
            content: format!("Current Dashboard Context: {pretty}"),
        });
    }
    let skip = history.len().saturating_sub(HISTORY_WINDOW);
    messages.extend(history[skip..].iter().map(|m| WireMessage {
        role: m.role,
        content: m.content.clone(),
    }));
    messages.push(WireMessage {
        role: Role::User,
        content: message.to_string(),
    });

    ChatRequest {
        model: settings.model.as_str().to_string(),
        messages,
        temperature: settings.temperature,
        max_tokens: settings.max_tokens,
    }
}

/// Owns the chat session and talks to the configured provider.
pub struct Assistant {
    provider: Arc<dyn ChatProvider>,
    session: Mutex<ChatSession>,
}

impl Assistant {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self {
            provider,
            session: Mutex::new(ChatSession::default()),
        }
    }

    pub fn session(&self) -> ChatSession {
        self.session.lock().expect("chat session poisoned").clone()
    }

    pub fn toggle(&self) -> bool {
        self.session.lock().expect("chat session poisoned").toggle()
    }

    pub fn clear(&self) {
        self.session.lock().expect("chat session poisoned").clear();
    }

    /// Send one user message. On success both the user message and the reply
    /// are in the session and the reply is returned. A missing key fails before
    /// anything is added; provider failures leave the user message in place and
    /// record the error on the session.
    pub async fn send_message(
        &self,
        settings: &AiSettings,
        message: &str,
        context: Option<&Value>,
    ) -> Result<ChatMessage, ChatError> {
        ensure_metrics_described();

        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let Some(api_key) = settings.resolved_api_key() else {
            let err = ChatError::MissingApiKey;
            self.fail(&err);
            return Err(err);
        };

        let history = {
            let mut s = self.session.lock().expect("chat session poisoned");
            let history = s.recent();
            s.push(ChatMessage::new(Role::User, message, Utc::now(), 0));
            s.is_loading = true;
            history
        };

        let req = build_request(settings, &history, message, context);
        counter!("chat_requests_total", "provider" => self.provider.name()).increment(1);
        tracing::info!(
            target: "chat",
            provider = self.provider.name(),
            model = %req.model,
            messages = req.messages.len(),
            with_context = context.is_some(),
            "sending chat completion"
        );

        match self.provider.complete(&api_key, &req).await {
            Ok(text) => {
                let reply = ChatMessage::new(Role::Assistant, text, Utc::now(), 1);
                let mut s = self.session.lock().expect("chat session poisoned");
                s.push(reply.clone());
                s.is_loading = false;
                Ok(reply)
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    fn fail(&self, err: &ChatError) {
        counter!("chat_errors_total", "kind" => err.kind()).increment(1);
        tracing::warn!(target: "chat", error = %err, "chat message failed");
        self.session
            .lock()
            .expect("chat session poisoned")
            .set_error(err);
    }
}
