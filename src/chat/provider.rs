//! Chat completion providers: the hosted OpenAI-compatible endpoint and a
//! scripted mock for tests and offline runs.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::{ChatError, ChatRequest};

/// One completion round-trip. Implementations return the assistant text.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, api_key: &str, req: &ChatRequest) -> Result<String, ChatError>;

    /// Provider name for logs.
    fn name(&self) -> &'static str;
}

/// `POST {endpoint}` with a bearer key, Chat Completions wire format.
pub struct OpenAiChatProvider {
    http: reqwest::Client,
    endpoint: reqwest::Url,
}

impl OpenAiChatProvider {
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = reqwest::Url::parse(endpoint)
            .with_context(|| format!("invalid chat completions url {endpoint:?}"))?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("social-listening-dashboard/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(60))
            .build()
            .context("building chat http client")?;
        Ok(Self { http, endpoint })
    }
}

#[derive(Deserialize)]
struct CompletionResp {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResp {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Provider error message from a non-OK body, or the generic fallback.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResp>(body)
        .ok()
        .and_then(|r| r.error)
        .and_then(|e| e.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| "API Error".to_string())
}

#[async_trait]
impl ChatProvider for OpenAiChatProvider {
    async fn complete(&self, api_key: &str, req: &ChatRequest) -> Result<String, ChatError> {
        let resp = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(api_key)
            .json(req)
            .send()
            .await
            .map_err(|e| ChatError::connection(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ChatError::connection(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(target: "chat", status = status.as_u16(), "completion rejected");
            return Err(ChatError::Api(api_error_message(&body)));
        }

        let parsed: CompletionResp = serde_json::from_str(&body)
            .map_err(|e| ChatError::Api(format!("unreadable completion: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ChatError::Api("API Error".to_string()))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Replies with a fixed outcome and remembers every request it saw.
pub struct MockChatProvider {
    reply: Result<String, ChatError>,
    seen: Mutex<Vec<ChatRequest>>,
}

impl MockChatProvider {
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            reply: Ok(text.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: ChatError) -> Self {
        Self {
            reply: Err(err),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.seen.lock().expect("mock requests poisoned").clone()
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    async fn complete(&self, _api_key: &str, req: &ChatRequest) -> Result<String, ChatError> {
        self.seen
            .lock()
            .expect("mock requests poisoned")
            .push(req.clone());
        self.reply.clone()
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
