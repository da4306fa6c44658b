use crate::config::Config;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CompletionError {
    /// The prompt (system + turns) is larger than the model accepts.
    #[error("completion input exceeds the model context length: {0}")]
    ContextLengthExceeded(String),
    #[error("completion API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("failed to reach completion API: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion response contained no choices")]
    EmptyResponse,
}

impl CompletionError {
    pub fn is_context_length(&self) -> bool {
        matches!(self, CompletionError::ContextLengthExceeded(_))
    }
}

/// The external text-completion capability.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        turns: &[Message],
        temperature: f32,
    ) -> Result<String, CompletionError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

/// OpenAI-compatible chat completion client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    organization: Option<String>,
}

impl OpenAiClient {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            api_url: config.openai_api_url.clone(),
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
            organization: config.openai_organization.clone(),
        }
    }
}

#[async_trait]
impl Completer for OpenAiClient {
    async fn complete(
        &self,
        system: &str,
        turns: &[Message],
        temperature: f32,
    ) -> Result<String, CompletionError> {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(Message::system(system));
        messages.extend_from_slice(turns);

        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature,
        };

        let mut builder = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(organization) = &self.organization {
            builder = builder.header("OpenAI-Organization", organization);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(classify_error(status, body));
        }

        let chat_response: ChatResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(CompletionError::EmptyResponse)
    }
}

fn classify_error(status: u16, body: String) -> CompletionError {
    if let Ok(ErrorEnvelope {
        error: Some(detail),
    }) = serde_json::from_str::<ErrorEnvelope>(&body)
    {
        if detail.code.as_deref() == Some("context_length_exceeded") {
            return CompletionError::ContextLengthExceeded(detail.message.unwrap_or_default());
        }
    }
    CompletionError::Api { status, body }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{body_partial_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    // ==================== Helper Functions ====================

    fn create_client(api_url: &str) -> OpenAiClient {
        OpenAiClient {
            client: reqwest::Client::new(),
            api_url: api_url.to_string(),
            api_key: "test-openai-key".to_string(),
            model: "gpt-4o-mini".to_string(),
            organization: None,
        }
    }

    fn create_openai_response(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [
                {
                    "index": 0,
                    "message": {
                        "role": "assistant",
                        "content": content
                    },
                    "finish_reason": "stop"
                }
            ]
        })
    }

    // ==================== Serialization Tests ====================

    #[test]
    fn test_message_roles_serialize_lowercase() {
        let json = serde_json::to_string(&Message::assistant("hi")).expect("Should serialize");
        assert!(json.contains("\"assistant\""));
    }

    #[test]
    fn test_chat_request_serialization() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![Message::system("Rephrase."), Message::user("你好")],
            temperature: 0.0,
        };
        let json = serde_json::to_value(&request).expect("Should serialize");
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "你好");
        assert_eq!(json["temperature"], 0.0);
    }

    #[test]
    fn test_classify_context_length_error() {
        let body = r#"{"error":{"message":"This model's maximum context length is 8192 tokens","type":"invalid_request_error","code":"context_length_exceeded"}}"#;
        let err = classify_error(400, body.to_string());
        assert!(err.is_context_length());
    }

    #[test]
    fn test_classify_other_errors() {
        let err = classify_error(500, "Internal Server Error".to_string());
        assert!(matches!(err, CompletionError::Api { status: 500, .. }));

        let body = r#"{"error":{"message":"bad key","code":"invalid_api_key"}}"#;
        assert!(!classify_error(401, body.to_string()).is_context_length());
    }

    // ==================== HTTP Tests ====================

    #[tokio::test]
    async fn test_complete_success_sends_system_first() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-openai-key"))
            .and(body_partial_json(serde_json::json!({
                "messages": [
                    {"role": "system", "content": "SYSTEM"},
                    {"role": "user", "content": "你好"}
                ],
                "temperature": 0.0
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(create_openai_response("Hello")),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_client(&format!("{}/v1/chat/completions", mock_server.uri()));
        let result = client
            .complete("SYSTEM", &[Message::user("你好")], 0.0)
            .await
            .expect("Should succeed");

        assert_eq!(result, "Hello");
    }

    #[tokio::test]
    async fn test_complete_surfaces_context_length() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {
                    "message": "maximum context length exceeded",
                    "type": "invalid_request_error",
                    "code": "context_length_exceeded"
                }
            })))
            .mount(&mock_server)
            .await;

        let client = create_client(&mock_server.uri());
        let err = client
            .complete("SYSTEM", &[Message::user("长文本")], 0.0)
            .await
            .unwrap_err();

        assert!(err.is_context_length());
    }

    #[tokio::test]
    async fn test_complete_api_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .mount(&mock_server)
            .await;

        let client = create_client(&mock_server.uri());
        let err = client.complete("SYSTEM", &[], 0.0).await.unwrap_err();

        assert!(err.to_string().contains("503"));
        assert!(!err.is_context_length());
    }

    #[tokio::test]
    async fn test_complete_empty_choices() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&mock_server)
            .await;

        let client = create_client(&mock_server.uri());
        let err = client.complete("SYSTEM", &[], 0.0).await.unwrap_err();

        assert!(matches!(err, CompletionError::EmptyResponse));
    }
}
