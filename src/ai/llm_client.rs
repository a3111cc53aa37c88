//! Language model backends.
//!
//! The plan generator only needs "conversation history + prompt -> text".
//! Each provider speaks its own HTTP dialect; all of them go through reqwest.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One entry of a conversation's model-facing history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// A chat-completion capable backend.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Send `prompt` as the next user message after `history`; return the
    /// model's text.
    async fn complete(&self, history: &[ChatMessage], prompt: &str) -> Result<String>;

    /// Description of this backend for logging
    fn description(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Gemini,
    OpenAi,
    Ollama,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "gemini",
            LlmProvider::OpenAi => "openai",
            LlmProvider::Ollama => "ollama",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(LlmProvider::Gemini),
            "openai" | "openai_compatible" => Ok(LlmProvider::OpenAi),
            "ollama" => Ok(LlmProvider::Ollama),
            other => bail!("Unknown provider '{}' (expected gemini, openai or ollama)", other),
        }
    }
}

/// Everything needed to build a backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f32,
}

/// Build the backend for `config`. Fails when a hosted provider has no key.
pub fn create_backend(config: &BackendConfig) -> Result<Arc<dyn LlmBackend>> {
    let client = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;

    let api_key = || -> Result<String> {
        match config.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key.to_string()),
            _ => bail!(
                "No API key configured for provider '{}'. Set it in settings, pass --api-key, or export the provider's key variable.",
                config.provider
            ),
        }
    };

    let backend: Arc<dyn LlmBackend> = match config.provider {
        LlmProvider::Gemini => Arc::new(GeminiBackend {
            client,
            base_url: base_url(config, DEFAULT_GEMINI_URL),
            model: config.model.clone(),
            api_key: api_key()?,
            temperature: config.temperature,
        }),
        LlmProvider::OpenAi => Arc::new(OpenAiBackend {
            client,
            base_url: base_url(config, DEFAULT_OPENAI_URL),
            model: config.model.clone(),
            api_key: api_key()?,
            temperature: config.temperature,
        }),
        LlmProvider::Ollama => Arc::new(OllamaBackend {
            client,
            base_url: base_url(config, DEFAULT_OLLAMA_URL),
            model: config.model.clone(),
            temperature: config.temperature,
        }),
    };

    tracing::info!("Using LLM backend: {}", backend.description());
    Ok(backend)
}

fn base_url(config: &BackendConfig, default: &str) -> String {
    config
        .base_url
        .as_deref()
        .filter(|url| !url.trim().is_empty())
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

async fn check_status(response: reqwest::Response, provider: &str) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    bail!("{} returned HTTP {}: {}", provider, status, body)
}

// Gemini generateContent

pub struct GeminiBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

impl GeminiBackend {
    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    fn request(&self, history: &[ChatMessage], prompt: &str) -> GeminiRequest {
        let mut contents: Vec<GeminiContent> = history
            .iter()
            .map(|m| GeminiContent {
                role: match m.role {
                    MessageRole::User => "user".to_string(),
                    MessageRole::Assistant => "model".to_string(),
                },
                parts: vec![GeminiPart {
                    text: m.content.clone(),
                }],
            })
            .collect();
        contents.push(GeminiContent {
            role: "user".to_string(),
            parts: vec![GeminiPart {
                text: prompt.to_string(),
            }],
        });

        GeminiRequest {
            contents,
            generation_config: GeminiGenerationConfig {
                temperature: self.temperature,
            },
        }
    }
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    async fn complete(&self, history: &[ChatMessage], prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(self.url())
            .json(&self.request(history, prompt))
            .send()
            .await
            .context("Failed to send request to Gemini")?;

        let parsed: GeminiResponse = check_status(response, "Gemini")
            .await?
            .json()
            .await
            .context("Failed to parse Gemini response")?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| c.content.parts.into_iter().map(|p| p.text).collect())
            .context("Gemini response had no candidates")?;
        Ok(text)
    }

    fn description(&self) -> String {
        format!("gemini ({})", self.model)
    }
}

// OpenAI-compatible chat/completions

pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<&'a ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn complete(&self, history: &[ChatMessage], prompt: &str) -> Result<String> {
        let last = ChatMessage::user(prompt);
        let body = OpenAiRequest {
            model: &self.model,
            messages: history.iter().chain(std::iter::once(&last)).collect(),
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to OpenAI-compatible endpoint")?;

        let parsed: OpenAiResponse = check_status(response, "OpenAI")
            .await?
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("Chat completion had no content")
    }

    fn description(&self) -> String {
        format!("openai ({} at {})", self.model, self.base_url)
    }
}

// Ollama /api/chat

pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<&'a ChatMessage>,
    stream: bool,
    format: &'a str,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn complete(&self, history: &[ChatMessage], prompt: &str) -> Result<String> {
        let last = ChatMessage::user(prompt);
        let body = OllamaRequest {
            model: &self.model,
            messages: history.iter().chain(std::iter::once(&last)).collect(),
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .context("Failed to send request to Ollama")?;

        let parsed: OllamaResponse = check_status(response, "Ollama")
            .await?
            .json()
            .await
            .context("Failed to parse Ollama response")?;
        Ok(parsed.message.content)
    }

    fn description(&self) -> String {
        format!("ollama ({} at {})", self.model, self.base_url)
    }
}
