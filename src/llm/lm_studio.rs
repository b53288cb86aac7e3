//! LM Studio client
//!
//! LM Studio serves an OpenAI-compatible chat completions API, including
//! multimodal messages with `image_url` parts for vision models.

use serde::{Deserialize, Serialize};
use std::future::IntoFuture;
use std::pin::Pin;

use crate::error::GenerationError;
use crate::image::EncodedImage;
use crate::llm::{Client, HasProvider};

/// Marker type for LM Studio provider
pub struct LmStudio;

/// Configuration for LM Studio client
#[derive(Clone, Debug)]
pub struct LmStudioConfig {
    /// Base URL including the `/v1` prefix (default: http://localhost:1234/v1)
    pub base_url: String,
    /// Model name sent with every request (default: local-model)
    pub default_model: String,
}

impl Default for LmStudioConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1234/v1".to_string(),
            default_model: "local-model".to_string(),
        }
    }
}

/// Request structure for chat completions
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    /// `-1` lets the server decide.
    pub max_tokens: i32,
    pub stream: bool,
}

/// Message body: plain text, or a list of typed parts for vision requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// A message in the chat format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: ChatContent,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: ChatContent::Text(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: ChatContent::Text(content.into()),
        }
    }

    /// A user message carrying a question and an image as a data URI
    pub fn user_with_image(text: impl Into<String>, image: &EncodedImage) -> Self {
        Self {
            role: "user".to_string(),
            content: ChatContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image.to_data_uri(),
                    },
                },
            ]),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatReply,
}

#[derive(Debug, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    /// Text of the first choice, or an empty string when there is none.
    pub fn into_text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default()
    }
}

/// Builder for LM Studio chat completions
pub struct LmStudioChatBuilder<'a, S> {
    client: &'a Client<S>,
    model: Option<String>,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

impl<'a, S> LmStudioChatBuilder<'a, S>
where
    S: HasProvider<LmStudio> + Send + Sync + 'static,
{
    pub fn new(client: &'a Client<S>) -> Self {
        Self {
            client,
            model: None,
            messages: Vec::new(),
            temperature: 0.7,
        }
    }

    /// Set the model for this completion (overrides default)
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Append prepared messages in order
    pub fn messages(mut self, messages: impl IntoIterator<Item = ChatMessage>) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn system(mut self, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::system(content));
        self
    }

    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::user(content));
        self
    }

    pub fn user_with_image(mut self, content: impl Into<String>, image: &EncodedImage) -> Self {
        self.messages.push(ChatMessage::user_with_image(content, image));
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    async fn execute(self) -> Result<String, GenerationError> {
        let config = self.client.lm_studio_config()?;
        let model = self.model.unwrap_or_else(|| config.default_model.clone());
        let request = ChatRequest {
            model,
            messages: self.messages,
            temperature: self.temperature,
            max_tokens: -1,
            stream: false,
        };
        let response = self.client.call_lm_studio(&request).await?;
        Ok(response.into_text())
    }
}

impl<'a, S> IntoFuture for LmStudioChatBuilder<'a, S>
where
    S: HasProvider<LmStudio> + Send + Sync + 'static,
{
    type Output = Result<String, GenerationError>;
    type IntoFuture = Pin<Box<dyn std::future::Future<Output = Self::Output> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.execute())
    }
}

impl<S> Client<S>
where
    S: HasProvider<LmStudio> + Send + Sync + 'static,
{
    fn lm_studio_config(&self) -> Result<&LmStudioConfig, GenerationError> {
        self.lm_studio_config.as_ref().ok_or_else(|| {
            GenerationError::ProviderNotConfigured("LM Studio not configured".to_string())
        })
    }

    /// Call the chat completions endpoint
    pub async fn call_lm_studio(&self, request: &ChatRequest) -> Result<ChatResponse, GenerationError> {
        let config = self.lm_studio_config()?;

        let response = self
            .client
            .post(format!("{}/chat/completions", config.base_url))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status { status, body });
        }

        Ok(response.json().await?)
    }

    pub fn lm_studio_chat(&self) -> LmStudioChatBuilder<'_, S> {
        LmStudioChatBuilder::new(self)
    }

    /// Non-streaming completion over `messages`; `model` overrides the
    /// configured default. An answer with no content is `""`.
    pub async fn chat_completion(
        &self,
        messages: Vec<ChatMessage>,
        model: Option<&str>,
    ) -> Result<String, GenerationError> {
        let mut chat = self.lm_studio_chat().messages(messages);
        if let Some(model) = model {
            chat = chat.model(model);
        }
        chat.await
    }

    /// Ask a vision model about an image
    pub async fn analyze_image(
        &self,
        image: &EncodedImage,
        question: &str,
    ) -> Result<String, GenerationError> {
        self.lm_studio_chat().user_with_image(question, image).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeServer, Reply, http_client};
    use serde_json::{Value, json};

    #[test]
    fn test_message_constructors() {
        assert_eq!(ChatMessage::system("be brief").role, "system");
        let user = ChatMessage::user("Hello");
        assert_eq!(user.role, "user");
        assert_eq!(user.content, ChatContent::Text("Hello".to_string()));
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "local-model".to_string(),
            messages: vec![
                ChatMessage::system("sys"),
                ChatMessage::user_with_image("what is this?", &EncodedImage::new("image/png", "QUJD")),
            ],
            temperature: 0.7,
            max_tokens: -1,
            stream: false,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["max_tokens"], -1);
        assert_eq!(value["stream"], false);
        assert_eq!(value["messages"][0]["content"], "sys");
        assert_eq!(value["messages"][1]["content"][0]["type"], "text");
        assert_eq!(value["messages"][1]["content"][1]["type"], "image_url");
        assert_eq!(
            value["messages"][1]["content"][1]["image_url"]["url"],
            "data:image/png;base64,QUJD"
        );
    }

    #[test]
    fn test_response_text() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "a linen suit"}}]
        }))
        .unwrap();
        assert_eq!(response.into_text(), "a linen suit");

        let empty: ChatResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert_eq!(empty.into_text(), "");
    }

    fn answer(content: Value) -> Reply {
        Reply::json(json!({"choices": [{"message": {"role": "assistant", "content": content}}]}))
    }

    #[tokio::test]
    async fn test_chat_completion_sends_messages_and_model() {
        let server = FakeServer::http(|_, _| answer(json!("a tailored linen suit"))).await;
        let client = Client::with_http(http_client()).with_lm_studio_at(format!("{}/v1/", server.url));

        let text = client
            .chat_completion(
                vec![ChatMessage::system("be brief"), ChatMessage::user("linen suit")],
                None,
            )
            .await
            .unwrap();
        assert_eq!(text, "a tailored linen suit");

        client
            .chat_completion(vec![ChatMessage::user("again")], Some("qwen2-vl"))
            .await
            .unwrap();

        let requests = server.requests();
        assert_eq!(requests[0].line(), "POST /v1/chat/completions");
        let first: Value = serde_json::from_str(&requests[0].body).unwrap();
        assert_eq!(first["model"], "local-model");
        assert_eq!(first["temperature"], json!(0.7));
        assert_eq!(first["messages"][0]["role"], "system");
        assert_eq!(first["messages"][1]["content"], "linen suit");
        let second: Value = serde_json::from_str(&requests[1].body).unwrap();
        assert_eq!(second["model"], "qwen2-vl");
    }

    #[tokio::test]
    async fn test_missing_content_and_failures() {
        let server = FakeServer::http(|_, path| {
            if path.starts_with("/ok") {
                answer(Value::Null)
            } else {
                Reply::status(503, "model not loaded")
            }
        })
        .await;

        let ok = Client::with_http(http_client()).with_lm_studio_at(format!("{}/ok", server.url));
        let text = ok
            .analyze_image(&EncodedImage::new("image/png", "QUJD"), "what is this?")
            .await
            .unwrap();
        assert_eq!(text, "");

        let down = Client::with_http(http_client()).with_lm_studio_at(format!("{}/down", server.url));
        assert!(matches!(
            down.chat_completion(vec![ChatMessage::user("hi")], None).await,
            Err(GenerationError::Status { status: 503, .. })
        ));
    }
}
