use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::errors::{PlanError, TransportError};
use crate::wire::{error_message, ChatRequest, MsgResponse};

pub mod http;

/// Status and body of whatever the API answered.
#[derive(Debug, Clone)]
pub struct RawReply {
    pub status: u16,
    pub body: String,
}

impl RawReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One POST to the generative API. `Err` means no response was received at all.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, api_key: &str, req: &ChatRequest) -> Result<RawReply, TransportError>;
}

/// Primary model first, then fallbacks; blanks skipped, duplicates dropped.
pub fn candidate_models(primary: &str, fallbacks: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for m in std::iter::once(primary).chain(fallbacks.iter().map(String::as_str)) {
        let m = m.trim();
        if !m.is_empty() && !out.iter().any(|seen| seen == m) {
            out.push(m.to_string());
        }
    }
    out
}

/// Obtains plan text from the first candidate model that can produce it.
pub struct PlanClient<T: Transport> {
    transport: T,
    api_key: Option<String>,
    key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl<T: Transport> PlanClient<T> {
    pub fn new(transport: T, api_key: Option<String>, key_env: &str, temperature: f32, max_tokens: u32) -> Self {
        Self { transport, api_key, key_env: key_env.to_string(), temperature, max_tokens }
    }

    pub async fn generate(&self, prompt: &str, models: &[String]) -> Result<String, PlanError> {
        let key = self
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| PlanError::MissingCredential(format!("set {} to your API key", self.key_env)))?;

        let mut last_err: Option<PlanError> = None;
        for model in models {
            match self.try_model(key, model, prompt).await {
                Ok(text) => {
                    info!(%model, chars = text.len(), "plan text received");
                    return Ok(text);
                }
                Err(e) if e.is_fallback_eligible() => {
                    warn!(%model, error = %e, "trying next candidate model");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or(PlanError::AllModelsFailed))
    }

    async fn try_model(&self, key: &str, model: &str, prompt: &str) -> Result<String, PlanError> {
        let req = ChatRequest::single_prompt(model, prompt, self.temperature, self.max_tokens);
        debug!(%model, "sending plan request");

        let reply = self
            .transport
            .send(key, &req)
            .await
            .map_err(|e| PlanError::Network { model: model.to_string(), message: e.to_string() })?;
        debug!(%model, status = reply.status, body = %reply.body, "raw reply");

        if !reply.is_success() {
            let message = error_message(&reply.body);
            if reply.status == 404 && reply.body.to_lowercase().contains("model") {
                return Err(PlanError::ModelUnavailable { model: model.to_string(), status: reply.status, message });
            }
            return Err(PlanError::Api { status: reply.status, model: model.to_string(), message });
        }

        // A 2xx we cannot read is as unusable as an empty one.
        let text = serde_json::from_str::<MsgResponse>(&reply.body)
            .map(|r| r.joined_text())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(PlanError::EmptyResponse { model: model.to_string() });
        }
        Ok(text)
    }
}
