use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, Result};

/// Longest slice of a raw body shown back to the user
pub const BODY_EXCERPT_CHARS: usize = 1000;

pub const DEFAULT_CHAT_PATH: &str = "/api/chat";
pub const CLEAR_PATH: &str = "/api/clear";
pub const HEALTH_PATH: &str = "/health";
pub const STATS_PATH: &str = "/api/stats";

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

/// Shape of `/api/chat` bodies. Every field is optional so that any JSON
/// object parses and the caller decides what it means.
#[derive(Deserialize, Default)]
struct ChatBody {
    response: Option<serde_json::Value>,
    error: Option<serde_json::Value>,
    details: Option<serde_json::Value>,
    session_id: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Record counts per data domain, from `GET /api/stats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DomainStats {
    pub flights: u64,
    pub hotels: u64,
    pub packages: u64,
    pub reviews: u64,
}

impl DomainStats {
    /// Label and count pairs in display order
    pub fn entries(&self) -> [(&'static str, u64); 4] {
        [
            ("Flights", self.flights),
            ("Hotels", self.hotels),
            ("Packages", self.packages),
            ("Reviews", self.reviews),
        ]
    }
}

/// Status and body of a chat call, before interpretation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReply {
    pub status: u16,
    pub body: String,
}

impl RawReply {
    pub fn classify(&self) -> ReplyOutcome {
        classify(self.status, &self.body)
    }
}

/// What a chat reply means for the transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    Response {
        text: String,
        session_id: Option<String>,
    },
    BackendError {
        error: String,
        details: Option<String>,
    },
    Unrecognized,
    Malformed {
        status: u16,
        excerpt: String,
    },
}

/// Interpret a chat reply. `error` wins over `response` when both are
/// present; a body that is not a JSON object is malformed.
pub fn classify(status: u16, body: &str) -> ReplyOutcome {
    let parsed = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) if value.is_object() => serde_json::from_value::<ChatBody>(value),
        _ => {
            return ReplyOutcome::Malformed {
                status,
                excerpt: excerpt(body),
            }
        }
    };

    let chat_body = parsed.unwrap_or_default();

    if let Some(error) = chat_body.error.as_ref().filter(|v| is_truthy(v)) {
        return ReplyOutcome::BackendError {
            error: value_text(error),
            details: chat_body
                .details
                .as_ref()
                .filter(|v| is_truthy(v))
                .map(value_text),
        };
    }

    if let Some(response) = chat_body.response.as_ref().filter(|v| is_truthy(v)) {
        return ReplyOutcome::Response {
            text: value_text(response),
            session_id: chat_body
                .session_id
                .as_ref()
                .filter(|v| is_truthy(v))
                .map(value_text),
        };
    }

    ReplyOutcome::Unrecognized
}

/// First [`BODY_EXCERPT_CHARS`] characters of a body
pub fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}

fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// HTTP client for the Intelligence Hub chat backend
#[derive(Clone, Debug)]
pub struct ChatClient {
    client: Client,
    base_url: String,
    chat_path: String,
    timeout: Duration,
}

impl ChatClient {
    /// Build a client with an in-memory cookie store; the backend keeps
    /// the conversation session in a cookie.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            chat_path: DEFAULT_CHAT_PATH.to_string(),
            timeout,
        })
    }

    /// Point chat requests at another path, e.g. the backend's echo endpoint
    pub fn with_chat_path(mut self, path: &str) -> Self {
        self.chat_path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Post a message. Any HTTP status is a reply; only transport
    /// failures, the timeout, and cancellation are errors.
    pub async fn send_chat(&self, message: &str, cancel: &CancellationToken) -> Result<RawReply> {
        let url = self.url(&self.chat_path);
        let request = async {
            let response = self
                .client
                .post(&url)
                .json(&ChatRequest { message })
                .send()
                .await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, ClientError>(RawReply { status, body })
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            outcome = tokio::time::timeout(self.timeout, request) => {
                outcome.map_err(|_| ClientError::Timeout(self.timeout))?
            }
        }
    }

    /// Ask the backend to start a fresh session. The body is ignored.
    pub async fn clear_session(&self) -> Result<()> {
        let response = tokio::time::timeout(
            self.timeout,
            self.client.post(self.url(CLEAR_PATH)).send(),
        )
        .await
        .map_err(|_| ClientError::Timeout(self.timeout))??;

        if !response.status().is_success() {
            return Err(ClientError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        let limit = Duration::from_secs(5).min(self.timeout);
        let response = tokio::time::timeout(limit, self.client.get(self.url(HEALTH_PATH)).send())
            .await
            .map_err(|_| ClientError::Timeout(limit))??;

        if !response.status().is_success() {
            return Err(ClientError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn stats(&self) -> Result<DomainStats> {
        let response = tokio::time::timeout(self.timeout, self.client.get(self.url(STATS_PATH)).send())
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))??;

        if !response.status().is_success() {
            return Err(ClientError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
