//! LLM chat-completion client.
//!
//! This module talks to an Azure OpenAI deployment over its REST API. It is
//! deliberately thin: one request, one response, no retries. Callers that
//! want a script and can live without one use [`crate::script::write_script`],
//! which turns every failure into an empty script.
//!
//! # Architecture
//!
//! - [`AskAsync`]: core trait defining async LLM interaction
//! - [`AzureChatClient`]: the production implementation
//!
//! Tests and alternative backends implement [`AskAsync`] directly.

use crate::config::AzureSettings;
use crate::error::ScriptError;
use crate::utils::truncate_for_log;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Trait for async LLM interaction.
///
/// Implementors of this trait can send text to an LLM and receive a response.
pub trait AskAsync {
    /// The type of response returned by the LLM.
    type Response;

    /// Send text to the LLM and receive a response.
    ///
    /// # Arguments
    ///
    /// * `text` - The user message to send
    ///
    /// # Returns
    ///
    /// The LLM's response, or an error if the request failed.
    async fn ask(&self, text: &str) -> Result<Self::Response, ScriptError>;
}

/// Sampling parameters for a completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionParams {
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 800,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completion client for an Azure OpenAI deployment.
///
/// Every request carries the same system prompt; [`AskAsync::ask`] supplies
/// the user message.
#[derive(Debug, Clone)]
pub struct AzureChatClient {
    http: reqwest::Client,
    settings: AzureSettings,
    system_prompt: String,
    params: CompletionParams,
}

impl AzureChatClient {
    /// Create a client.
    ///
    /// # Arguments
    ///
    /// * `settings` - Credential, endpoint, deployment and API version
    /// * `system_prompt` - Instruction sent ahead of every user message
    /// * `params` - Temperature and output size
    /// * `timeout` - Whole-request timeout
    pub fn new(
        settings: AzureSettings,
        system_prompt: impl Into<String>,
        params: CompletionParams,
        timeout: Duration,
    ) -> Result<Self, ScriptError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            settings,
            system_prompt: system_prompt.into(),
            params,
        })
    }

    fn completions_url(&self) -> Result<String, ScriptError> {
        let s = &self.settings;
        if s.api_key.is_empty() {
            return Err(ScriptError::NotConfigured("AZURE_OPENAI_KEY"));
        }
        if s.endpoint.is_empty() {
            return Err(ScriptError::NotConfigured("AZURE_OPENAI_ENDPOINT"));
        }
        if s.deployment.is_empty() {
            return Err(ScriptError::NotConfigured("AZURE_DEPLOYMENT_NAME"));
        }
        if s.api_version.is_empty() {
            return Err(ScriptError::NotConfigured("AZURE_API_VERSION"));
        }
        Ok(format!(
            "{}/openai/deployments/{}/chat/completions",
            s.endpoint.trim_end_matches('/'),
            urlencoding::encode(&s.deployment)
        ))
    }
}

impl AskAsync for AzureChatClient {
    type Response = String;

    #[instrument(level = "info", skip_all, fields(deployment = %self.settings.deployment))]
    async fn ask(&self, text: &str) -> Result<Self::Response, ScriptError> {
        let url = self.completions_url()?;
        let body = ChatRequest {
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            temperature: self.params.temperature,
            max_tokens: self.params.max_tokens,
        };

        let t0 = Instant::now();
        let response = self
            .http
            .post(&url)
            .query(&[("api-version", self.settings.api_version.as_str())])
            .header("api-key", &self.settings.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "Completion rejected"
            );
            return Err(ScriptError::UpstreamRejection {
                status: status.as_u16(),
            });
        }

        let raw = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&raw).map_err(|e| {
            warn!(
                error = %e,
                response_preview = %truncate_for_log(&raw, 300),
                "Completion body is not valid JSON"
            );
            ScriptError::MalformedResponse(e.to_string())
        })?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ScriptError::MalformedResponse("no choices in response".to_string()))?;

        info!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            chars = content.chars().count(),
            "Completion received"
        );
        Ok(content)
    }
}
