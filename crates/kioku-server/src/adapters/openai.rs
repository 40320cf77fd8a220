//! OpenAI implementations of EmbeddingProvider and CompletionProvider

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use kioku::domain::{ChatMessage, MessageRole};
use kioku::ports::{CompletionOptions, CompletionResponse, TokenUsage};
use kioku::{CompletionProvider, DomainError, EmbeddingProvider};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

fn http_client(timeout: Duration) -> Result<Client, DomainError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| DomainError::Infrastructure(format!("Failed to build HTTP client: {e}")))
}

fn millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

/// Map a non-success OpenAI response onto the domain taxonomy
fn classify_error(status: StatusCode, body: &str) -> DomainError {
    let quota = body.contains("insufficient_quota") || body.contains("invalid_api_key");
    match status {
        _ if quota => DomainError::QuotaExceeded(format!("OpenAI {status}: {body}")),
        StatusCode::TOO_MANY_REQUESTS => DomainError::RateLimited(format!("OpenAI: {body}")),
        s if s.is_server_error() => DomainError::Infrastructure(format!("OpenAI {s}: {body}")),
        s => DomainError::ExternalService(format!("OpenAI {s}: {body}")),
    }
}

fn transport_error(e: reqwest::Error, timeout: Duration) -> DomainError {
    if e.is_timeout() {
        DomainError::Timeout {
            operation: "OpenAI request".to_string(),
            after_ms: millis(timeout),
        }
    } else if e.is_connect() || e.is_request() {
        DomainError::Infrastructure(format!("OpenAI unreachable: {e}"))
    } else {
        DomainError::ExternalService(format!("OpenAI: {e}"))
    }
}

// ============================================
// Embeddings
// ============================================

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// OpenAI embeddings (text-embedding-3-*)
#[derive(Clone)]
pub struct OpenAiEmbedding {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl OpenAiEmbedding {
    pub fn new(
        api_key: String,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, text: &str, dimension: usize) -> Result<Vec<f32>, DomainError> {
        let request = EmbeddingRequest {
            input: text,
            model: &self.model,
            dimensions: dimension,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &error_text));
        }

        let embedding_response: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        embedding_response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| DomainError::ExternalService("No embedding returned".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ============================================
// Chat completions
// ============================================

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    model: String,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

fn wire_role(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    }
}

/// OpenAI chat completions
#[derive(Clone)]
pub struct OpenAiCompletion {
    client: Client,
    api_key: String,
    default_model: String,
    base_url: String,
    timeout: Duration,
}

impl OpenAiCompletion {
    pub fn new(
        api_key: String,
        default_model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key,
            default_model: default_model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_request<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        options: &'a CompletionOptions,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: options.model.as_deref().unwrap_or(&self.default_model),
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: wire_role(m.role),
                    content: &m.content,
                })
                .collect(),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            response_format: options.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletion {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, DomainError> {
        let request = self.build_request(messages, options);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &error_text));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| DomainError::ExternalService("No completion returned".to_string()))?;

        let usage = chat
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content,
            model: chat.model,
            usage,
        })
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.default_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_error() {
        assert!(matches!(
            classify_error(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            DomainError::RateLimited(_)
        ));
        assert!(matches!(
            classify_error(
                StatusCode::TOO_MANY_REQUESTS,
                r#"{"error":{"code":"insufficient_quota"}}"#
            ),
            DomainError::QuotaExceeded(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::UNAUTHORIZED, r#"{"error":{"code":"invalid_api_key"}}"#),
            DomainError::QuotaExceeded(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::BAD_GATEWAY, ""),
            DomainError::Infrastructure(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::BAD_REQUEST, "bad input"),
            DomainError::ExternalService(_)
        ));
    }

    #[test]
    fn test_chat_request_body() {
        let completion =
            OpenAiCompletion::new("sk-test".to_string(), "gpt-4o-mini", Duration::from_secs(5))
                .unwrap();
        let messages = vec![ChatMessage::system("be terse"), ChatMessage::user("hi")];

        let options = CompletionOptions {
            json_mode: true,
            ..CompletionOptions::with_temperature(0.0)
        };
        let body = serde_json::to_value(completion.build_request(&messages, &options)).unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["temperature"], 0.0);

        let options = CompletionOptions::default().model("gpt-4o");
        let body = serde_json::to_value(completion.build_request(&messages, &options)).unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_timeout_millis_saturate() {
        assert_eq!(millis(Duration::from_secs(30)), 30_000);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_embedding_provider_builds() {
        let embedder = OpenAiEmbedding::new(
            "sk-test".to_string(),
            "text-embedding-3-small",
            Duration::from_secs(5),
        )
        .unwrap()
        .with_base_url("http://localhost:9999/v1");
        assert_eq!(embedder.model_name(), "text-embedding-3-small");
        assert_eq!(embedder.base_url, "http://localhost:9999/v1");
    }

    #[test]
    fn test_embedding_request_sends_dimensions() {
        let body = serde_json::to_value(EmbeddingRequest {
            input: "hello",
            model: "text-embedding-3-small",
            dimensions: 256,
        })
        .unwrap();
        assert_eq!(body["dimensions"], 256);
    }
}
