use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Duration;

use crate::config::Config;
use crate::error::ChatError;
use crate::types::ContextEntry;

/// Body of a generate request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantRequest {
    pub message: String,
    pub context: Vec<ContextEntry>,
}

/// Body of a successful generate response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantReply {
    pub message: String,
}

/// Remote service that answers a prompt given the prior context
#[async_trait]
pub trait RemoteAssistant: Send + Sync {
    async fn generate(&self, request: &AssistantRequest) -> Result<String, ChatError>;
}

/// Assistant reached over HTTP at `{base_url}/generate`
#[derive(Clone)]
pub struct HttpAssistant {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAssistant {
    pub fn new(config: &Config) -> Result<Self, ChatError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;

        Ok(Self::with_client(&config.base_url, client))
    }

    pub fn with_client(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/generate", self.base_url)
    }
}

#[async_trait]
impl RemoteAssistant for HttpAssistant {
    async fn generate(&self, request: &AssistantRequest) -> Result<String, ChatError> {
        let url = self.endpoint();
        tracing::debug!(%url, context_len = request.context.len(), "Sending prompt");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %error_text, "Assistant request rejected");
            return Err(ChatError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let reply: AssistantReply = serde_json::from_str(&body)
            .map_err(|e| ChatError::InvalidResponse(e.to_string()))?;
        Ok(reply.message)
    }
}
