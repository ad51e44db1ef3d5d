use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::errors::LlmError;

/// Fast model for per-prediction explanations.
pub const EXPLAIN_MODEL: &str = "llama-3.1-8b-instant";
/// Larger model for research-brief synthesis and case agents.
pub const SYNTH_MODEL: &str = "llama-3.3-70b-versatile";

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

/// Trait for chat-completion providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

// Groq exposes an OpenAI-compatible chat-completions API.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Debug, Serialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

pub struct GroqProvider {
    api_key: String,
    client: Client,
}

impl GroqProvider {
    const ENDPOINT: &'static str = "https://api.groq.com/openai/v1/chat/completions";

    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self { api_key, client }
    }

    /// Reads GROQ_API_KEY; returns None when the LLM layer is disabled.
    pub fn from_env() -> Option<Self> {
        match std::env::var("GROQ_API_KEY") {
            Ok(key) if !key.is_empty() => Some(Self::new(key)),
            _ => None,
        }
    }

    async fn call_with_retry(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let mut retry_count = 0;
        let max_retries = 3;
        let mut delay = Duration::from_secs(1);

        loop {
            match self.call(request).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    retry_count += 1;
                    if retry_count >= max_retries {
                        error!("Groq call failed after {} retries: {}", max_retries, e);
                        return Err(e);
                    }

                    warn!(
                        "Groq call failed (attempt {}/{}): {}. Retrying in {:?}...",
                        retry_count, max_retries, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    async fn call(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let response = self
            .client
            .post(Self::ENDPOINT)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();

        if status == 429 {
            return Err(LlmError::RateLimited);
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::ApiError(format!("HTTP {}: {}", status, error_text)));
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl LlmProvider for GroqProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        info!(
            "Requesting LLM completion (model: {}, max_tokens: {})",
            request.model, request.max_tokens
        );

        let chat_request = ChatRequest {
            model: request.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: request.prompt,
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self.call_with_retry(&chat_request).await?;

        let content = response
            .choices
            .first()
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?
            .message
            .content
            .trim()
            .to_string();

        if let Some(usage) = response.usage {
            info!(
                "LLM completion received. Tokens: {} prompt + {} completion = {} total",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            );
        }

        Ok(content)
    }
}

/// Best-effort extraction of a JSON object from an LLM reply: strips code
/// fences, then falls back to the widest brace span, then to brace-balance
/// salvage for truncated output.
pub fn extract_json_object(raw: &str) -> Option<serde_json::Value> {
    let text = strip_code_fences(raw);

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
        if value.is_object() {
            return Some(value);
        }
    }

    let re = Regex::new(r"(?s)\{.*\}").unwrap();
    let span = match re.find(text) {
        Some(m) => m.as_str(),
        // Truncated reply with no closing brace at all
        None => &text[text.find('{')?..],
    };

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(span) {
        return Some(value);
    }

    // Close whatever strings and brackets are still open
    let repaired = close_open_brackets(span);
    serde_json::from_str::<serde_json::Value>(&repaired).ok()
}

fn close_open_brackets(span: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in span.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut repaired = span.to_string();
    if in_string {
        repaired.push('"');
    }
    while let Some(c) = stack.pop() {
        repaired.push(c);
    }
    repaired
}

/// Same, for replies expected to be a bare JSON array.
pub fn extract_json_array(raw: &str) -> Option<serde_json::Value> {
    let text = strip_code_fences(raw);

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
        if value.is_array() {
            return Some(value);
        }
    }

    let re = Regex::new(r"(?s)\[.*\]").unwrap();
    let span = re.find(text)?.as_str();
    serde_json::from_str::<serde_json::Value>(span).ok()
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        let rest = rest.trim_start_matches(['\r', '\n']);
        if let Some(end) = rest.rfind("```") {
            return rest[..end].trim();
        }
        return rest.trim();
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_json() {
        let value = extract_json_object(r#"{"headline": "ok"}"#).unwrap();
        assert_eq!(value["headline"], "ok");
    }

    #[test]
    fn test_extract_fenced_json() {
        let raw = "```json\n{\"headline\": \"fenced\"}\n```";
        let value = extract_json_object(raw).unwrap();
        assert_eq!(value["headline"], "fenced");
    }

    #[test]
    fn test_extract_json_with_prose_around() {
        let raw = "Sure, here is the brief:\n{\"score\": 42}\nHope this helps!";
        let value = extract_json_object(raw).unwrap();
        assert_eq!(value["score"], 42);
    }

    #[test]
    fn test_salvage_truncated_json() {
        let raw = r#"{"risks": [{"title": "Margin pressure""#;
        let value = extract_json_object(raw).unwrap();
        assert_eq!(value["risks"][0]["title"], "Margin pressure");
    }

    #[test]
    fn test_extract_array() {
        let raw = "```\n[{\"title\": \"a\"}, {\"title\": \"b\"}]\n```";
        let value = extract_json_array(raw).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_no_json_returns_none() {
        assert!(extract_json_object("no json here").is_none());
    }
}
