//! Async decision clients for the two model backends
//!
//! Both backends take the same [`PromptRecord`] and model identifier and
//! return the model's raw text, constrained by the same JSON schema. Transport
//! problems (network, non-2xx, malformed envelope, provider error) come back as
//! `Err`; an answer that is merely unusable is still `Ok` and is left to the
//! resolver.

use crate::core::config::{self, AgentConfig, BackendKind};
use crate::core::error::{ArenaError, Result};
use crate::core::types::{BoxFuture, ModelId};
use crate::llm::prompt::{Message, PromptRecord};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Anything that can turn a prompt into raw model text
pub trait DecisionBackend: Send + Sync {
    fn submit<'a>(
        &'a self,
        prompt: &'a PromptRecord,
        model: &'a ModelId,
    ) -> BoxFuture<'a, Result<String>>;

    fn kind(&self) -> BackendKind;
}

/// Output constraint shared by both backends
pub fn decision_schema() -> Value {
    json!({
        "title": "BattleDecision",
        "type": "object",
        "properties": {
            "reasoning": {
                "title": "Reasoning",
                "description": "Brief explanation of why this action was chosen",
                "type": "string"
            },
            "action": {
                "title": "Action",
                "description": "The action to take - either a move id or the species of the Pokemon to switch to",
                "type": "string"
            },
            "scratchpad": {
                "title": "Scratchpad",
                "description": "Notes to remember on later turns of this battle, empty when there is nothing to add",
                "type": "string"
            }
        },
        "required": ["reasoning", "action", "scratchpad"],
        "additionalProperties": false
    })
}

/// Construct the backend selected by the agent's configuration
pub fn build_backend(agent: &AgentConfig) -> Result<Box<dyn DecisionBackend>> {
    let timeout = agent.request_timeout();
    match agent.backend {
        BackendKind::Local => Ok(Box::new(LocalBackend::new(&config::local_host(), timeout)?)),
        BackendKind::Router => Ok(Box::new(RouterBackend::new(
            config::router_api_key()?,
            config::DEFAULT_ROUTER_URL.to_string(),
            timeout,
        )?)),
    }
}

fn http_client(timeout: Option<Duration>) -> Result<Client> {
    let mut builder = Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// Locally reachable inference server speaking the `/api/chat` protocol
pub struct LocalBackend {
    client: Client,
    endpoint: String,
}

impl LocalBackend {
    pub fn new(host: &str, timeout: Option<Duration>) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: format!("{}/api/chat", host.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn chat(&self, prompt: &PromptRecord, model: &ModelId) -> Result<String> {
        let request = LocalChatRequest {
            model: model.as_str(),
            messages: prompt.messages(),
            format: decision_schema(),
            stream: false,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ArenaError::Status { status, body });
        }

        let reply: LocalChatResponse = response.json().await?;
        Ok(reply.message.content)
    }
}

impl DecisionBackend for LocalBackend {
    fn submit<'a>(
        &'a self,
        prompt: &'a PromptRecord,
        model: &'a ModelId,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.chat(prompt, model))
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }
}

/// Hosted multi-model router reached over HTTPS with a bearer credential
pub struct RouterBackend {
    client: Client,
    api_url: String,
    api_key: String,
}

impl RouterBackend {
    pub fn new(api_key: String, api_url: String, timeout: Option<Duration>) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            api_url,
            api_key,
        })
    }

    async fn complete(&self, prompt: &PromptRecord, model: &ModelId) -> Result<String> {
        let request = RouterRequest {
            model: model.as_str(),
            messages: prompt.messages(),
            response_format: json!({
                "type": "json_schema",
                "json_schema": {
                    "name": "action_response",
                    "strict": true,
                    "schema": decision_schema(),
                }
            }),
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ArenaError::Status {
                status: status.as_u16(),
                body,
            });
        }

        extract_router_content(&body)
    }
}

impl DecisionBackend for RouterBackend {
    fn submit<'a>(
        &'a self,
        prompt: &'a PromptRecord,
        model: &'a ModelId,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.complete(prompt, model))
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Router
    }
}

/// Pull `choices[0].message.content` out of a chat-completions body
fn extract_router_content(body: &str) -> Result<String> {
    let data: Value = serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(500).collect();
        ArenaError::Envelope(format!("{} - body: {}", e, preview))
    })?;

    if let Some(error) = data.get("error") {
        return Err(ArenaError::Api(error.to_string()));
    }

    data.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ArenaError::Envelope(format!("missing choices[0].message.content: {}", data)))
}

#[derive(Serialize)]
struct LocalChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    format: Value,
    stream: bool,
}

#[derive(Deserialize)]
struct LocalChatResponse {
    message: LocalChatMessage,
}

#[derive(Deserialize)]
struct LocalChatMessage {
    content: String,
}

#[derive(Serialize)]
struct RouterRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    response_format: Value,
}
