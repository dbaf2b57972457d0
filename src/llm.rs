//! LLM client abstraction and Gemini API implementation.
//!
//! This module provides a generic [`LlmClient`] trait for chat-style text
//! completion, along with concrete implementations:
//!
//! - [`GeminiClient`]: production client for the Gemini generateContent API
//! - [`MockLlmClient`]: test double for unit tests
//!
//! Used by the translator to turn natural-language questions into SQL.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::history::Turn;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The GEMINI_API_KEY environment variable is not set.
    #[error("GEMINI_API_KEY environment variable not set")]
    MissingApiKey,

    /// HTTP or network error occurred.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Failed to parse the API response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Model returned no text content.
    #[error("Model returned empty response")]
    EmptyResponse,
}

// ============================================================================
// Completion Type
// ============================================================================

/// The result of a successful completion request.
#[derive(Debug, Clone)]
pub struct Completion {
    /// The generated text from the model.
    pub text: String,
    /// Total token usage reported by the service for this call.
    pub total_tokens: u64,
}

// ============================================================================
// LlmClient Trait
// ============================================================================

/// Generic interface for chat-style LLM clients.
///
/// The caller supplies the full ordered conversation transcript on every
/// call; the client is stateless between calls.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// The model name, used for cost accounting.
    fn model(&self) -> &str;

    /// Generate a completion for the given transcript.
    ///
    /// `max_output_tokens` caps the length of the generated reply.
    async fn complete(
        &self,
        history: &[Turn],
        max_output_tokens: u32,
    ) -> Result<Completion, LlmError>;
}

// ============================================================================
// Gemini API Implementation
// ============================================================================

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-flash-latest";

/// Client for the Gemini generateContent API.
///
/// Sends the ordered role/text transcript plus a fixed system instruction
/// (translation rules and the database schema document) on every call.
pub struct GeminiClient {
    api_key: String,
    model: String,
    system_instruction: String,
    client: reqwest::Client,
}

/// Request body for the generateContent endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: ContentPart,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

/// One entry in the conversation transcript.
#[derive(Debug, Serialize, Deserialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

/// Role-less content wrapper used for the system instruction.
#[derive(Debug, Serialize)]
struct ContentPart {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

/// Response from the generateContent endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    total_token_count: u64,
}

/// Response from the model listing endpoint.
#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
}

impl GeminiClient {
    /// Create a new client by reading the API key from the environment.
    ///
    /// Reads the `GEMINI_API_KEY` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::MissingApiKey`] if the environment variable is
    /// not set.
    pub fn from_env(model: String, system_instruction: String) -> Result<Self, LlmError> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| LlmError::MissingApiKey)?;
        Ok(Self::new(api_key, model, system_instruction))
    }

    /// Create a new client with an explicit API key.
    pub fn new(api_key: String, model: String, system_instruction: String) -> Self {
        Self {
            api_key,
            model,
            system_instruction,
            client: reqwest::Client::new(),
        }
    }

    /// List the Gemini model names available to this API key.
    pub async fn list_models(api_key: &str) -> Result<Vec<String>, LlmError> {
        let client = reqwest::Client::new();
        let response = client
            .get(format!("{GEMINI_BASE_URL}/models"))
            .header("x-goog-api-key", api_key)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let parsed: ModelsResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        Ok(parsed
            .models
            .into_iter()
            .map(|m| m.name)
            .filter(|name| name.contains("gemini"))
            .collect())
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        history: &[Turn],
        max_output_tokens: u32,
    ) -> Result<Completion, LlmError> {
        let contents = history
            .iter()
            .map(|turn| Content {
                role: turn.role.as_str().to_string(),
                parts: vec![Part {
                    text: turn.text.clone(),
                }],
            })
            .collect();

        let request_body = GenerateRequest {
            system_instruction: ContentPart {
                parts: vec![Part {
                    text: self.system_instruction.clone(),
                }],
            },
            contents,
            generation_config: GenerationConfig { max_output_tokens },
        };

        let response = self
            .client
            .post(format!(
                "{GEMINI_BASE_URL}/models/{}:generateContent",
                self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let api_response: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let total_tokens = api_response
            .usage_metadata
            .map(|u| u.total_token_count)
            .unwrap_or(0);

        let text: String = api_response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(Completion { text, total_tokens })
    }
}

// ============================================================================
// Mock Implementation (Test Only)
// ============================================================================

/// Mock LLM client for testing. Returns pre-programmed responses in FIFO
/// order and counts how many completions were requested.
#[cfg(test)]
pub struct MockLlmClient {
    /// Pre-programmed responses to return in FIFO order.
    pub responses: std::sync::Mutex<std::collections::VecDeque<String>>,
    /// Token count reported for every completion.
    pub tokens_per_call: u64,
    /// Number of `complete` calls made so far.
    pub calls: std::sync::atomic::AtomicU32,
    /// When true, every call fails with a transport error.
    fail: bool,
}

#[cfg(test)]
impl MockLlmClient {
    /// Create a new mock client with a sequence of responses.
    ///
    /// Each call to [`complete`](LlmClient::complete) returns the next
    /// response in order, reporting 100 tokens of usage.
    ///
    /// # Panics
    ///
    /// Panics if [`complete`](LlmClient::complete) is called more times
    /// than there are responses.
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
            tokens_per_call: 100,
            calls: std::sync::atomic::AtomicU32::new(0),
            fail: false,
        }
    }

    /// Create a mock client whose every call fails with an HTTP error.
    pub fn failing() -> Self {
        Self {
            responses: std::sync::Mutex::new(std::collections::VecDeque::new()),
            tokens_per_call: 0,
            calls: std::sync::atomic::AtomicU32::new(0),
            fail: true,
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl LlmClient for MockLlmClient {
    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(
        &self,
        _history: &[Turn],
        _max_output_tokens: u32,
    ) -> Result<Completion, LlmError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        if self.fail {
            return Err(LlmError::Http("connection refused".into()));
        }

        let text = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("MockLlmClient: no more responses available");

        Ok(Completion {
            text,
            total_tokens: self.tokens_per_call,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
