//! Google Gemini / Imagen client
//!
//! Covers `generateContent` (text, vision and image-capable models) and the
//! Imagen `predict` endpoint.

use serde::{Deserialize, Serialize};
use std::future::IntoFuture;
use std::pin::Pin;

use crate::error::GenerationError;
use crate::image::EncodedImage;
use crate::llm::{Client, HasProvider};

/// Marker type for Gemini provider
pub struct Gemini;

/// Configuration for Gemini client
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    /// API key for authentication
    pub api_key: String,
    /// Base URL (default: https://generativelanguage.googleapis.com)
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
        }
    }
}

/// Request structure for Gemini generate content
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub safety_settings: Vec<SafetySetting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GeminiGenerationConfig>,
}

/// Content structure for Gemini
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

/// A part of content: text or inline binary data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

impl GeminiPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    pub fn image(image: &EncodedImage) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: image.mime_type.clone(),
                data: image.data.clone(),
            }),
        }
    }
}

impl GeminiContent {
    pub fn user(parts: Vec<GeminiPart>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts,
        }
    }
}

/// Harm-category threshold sent with each request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySetting {
    pub category: String,
    pub threshold: String,
}

impl SafetySetting {
    fn new(category: &str, threshold: &str) -> Self {
        Self {
            category: category.to_string(),
            threshold: threshold.to_string(),
        }
    }

    /// Relaxed mode loosens every category to "block only high"; restrictive
    /// mode blocks sexually explicit content from "low" upwards.
    pub fn for_content_mode(relaxed: bool) -> Vec<SafetySetting> {
        if relaxed {
            [
                "HARM_CATEGORY_SEXUALLY_EXPLICIT",
                "HARM_CATEGORY_HATE_SPEECH",
                "HARM_CATEGORY_HARASSMENT",
                "HARM_CATEGORY_DANGEROUS_CONTENT",
            ]
            .iter()
            .map(|c| SafetySetting::new(c, "BLOCK_ONLY_HIGH"))
            .collect()
        } else {
            vec![SafetySetting::new(
                "HARM_CATEGORY_SEXUALLY_EXPLICIT",
                "BLOCK_LOW_AND_ABOVE",
            )]
        }
    }
}

/// Generation configuration for Gemini
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingConfig {
    pub thinking_budget: u32,
}

/// Response from Gemini generate content
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<GeminiContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

/// Finish reasons that mean a content filter, rather than the safety
/// classifier, stopped the image.
const FILTER_FINISH_REASONS: &[&str] = &["IMAGE_OTHER", "PROHIBITED_CONTENT", "BLOCKLIST", "IMAGE_SAFETY"];

impl GeminiResponse {
    /// Extract the first inline image, classifying every way it can be missing.
    pub fn into_image(self, model: &str) -> Result<EncodedImage, GenerationError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            log::debug!("{} prompt blocked: {}", model, reason);
            return Err(GenerationError::SafetyBlocked(model.to_string()));
        }

        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(GenerationError::NoImageData(model.to_string()));
        };

        match candidate.finish_reason.as_deref() {
            Some("SAFETY") => return Err(GenerationError::SafetyBlocked(model.to_string())),
            Some(reason) if FILTER_FINISH_REASONS.contains(&reason) => {
                return Err(GenerationError::ContentFiltered(model.to_string()));
            }
            _ => {}
        }

        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
        if let Some(inline) = parts
            .iter()
            .filter_map(|p| p.inline_data.as_ref())
            .find(|d| !d.data.is_empty())
        {
            return Ok(EncodedImage::new(inline.mime_type.clone(), inline.data.clone()));
        }

        if let Some(text) = parts.first().and_then(|p| p.text.as_deref()) {
            let preview: String = text.chars().take(100).collect();
            return Err(GenerationError::TextInsteadOfImage(preview));
        }

        Err(GenerationError::NoImageData(model.to_string()))
    }

    /// Concatenated text of the first candidate, trimmed.
    pub fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

/// Imagen predict request
#[derive(Debug, Serialize)]
pub struct ImagenRequest {
    pub instances: Vec<ImagenInstance>,
    pub parameters: ImagenParameters,
}

#[derive(Debug, Serialize)]
pub struct ImagenInstance {
    pub prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagenParameters {
    pub sample_count: u32,
    pub aspect_ratio: String,
    pub output_mime_type: String,
}

#[derive(Debug, Deserialize)]
pub struct ImagenResponse {
    #[serde(default)]
    pub predictions: Vec<ImagenPrediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagenPrediction {
    pub bytes_base64_encoded: Option<String>,
    pub mime_type: Option<String>,
}

/// Builder for a single `generateContent` call
pub struct GeminiGenerateBuilder<'a, S> {
    client: &'a Client<S>,
    model: String,
    parts: Vec<GeminiPart>,
    safety_settings: Vec<SafetySetting>,
    generation_config: Option<GeminiGenerationConfig>,
}

impl<'a, S> GeminiGenerateBuilder<'a, S>
where
    S: HasProvider<Gemini> + Send + Sync + 'static,
{
    pub fn new(client: &'a Client<S>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            parts: Vec::new(),
            safety_settings: Vec::new(),
            generation_config: None,
        }
    }

    /// Append a text part
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(GeminiPart::text(text));
        self
    }

    /// Append an inline image part
    pub fn image(mut self, image: &EncodedImage) -> Self {
        self.parts.push(GeminiPart::image(image));
        self
    }

    pub fn safety_settings(mut self, settings: Vec<SafetySetting>) -> Self {
        self.safety_settings = settings;
        self
    }

    /// Ask for extended reasoning before answering
    pub fn thinking_budget(mut self, budget: u32) -> Self {
        self.generation_config
            .get_or_insert_with(GeminiGenerationConfig::default)
            .thinking_config = Some(ThinkingConfig {
            thinking_budget: budget,
        });
        self
    }

    /// Request image output alongside text
    pub fn with_image_output(mut self) -> Self {
        self.generation_config
            .get_or_insert_with(GeminiGenerationConfig::default)
            .response_modalities = Some(vec!["TEXT".to_string(), "IMAGE".to_string()]);
        self
    }
}

impl<'a, S> IntoFuture for GeminiGenerateBuilder<'a, S>
where
    S: HasProvider<Gemini> + Send + Sync + 'static,
{
    type Output = Result<GeminiResponse, GenerationError>;
    type IntoFuture = Pin<Box<dyn std::future::Future<Output = Self::Output> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let request = GeminiRequest {
                contents: vec![GeminiContent::user(self.parts)],
                safety_settings: self.safety_settings,
                generation_config: self.generation_config,
            };
            self.client.call_gemini(&self.model, &request).await
        })
    }
}

impl<S> Client<S>
where
    S: HasProvider<Gemini> + Send + Sync + 'static,
{
    fn gemini_endpoint(&self, model: &str, method: &str) -> Result<String, GenerationError> {
        let config = self.gemini_config.as_ref().ok_or_else(|| {
            GenerationError::ProviderNotConfigured("Gemini not configured".to_string())
        })?;
        if config.api_key.trim().is_empty() {
            return Err(GenerationError::ProviderNotConfigured(
                "Gemini API key is missing".to_string(),
            ));
        }
        Ok(format!(
            "{}/v1beta/models/{}:{}?key={}",
            config.base_url, model, method, config.api_key
        ))
    }

    /// Call Gemini's generate content API
    pub async fn call_gemini(
        &self,
        model: &str,
        request: &GeminiRequest,
    ) -> Result<GeminiResponse, GenerationError> {
        let url = self.gemini_endpoint(model, "generateContent")?;

        let response = self.client.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status { status, body });
        }

        Ok(response.json().await?)
    }

    /// Call Imagen's predict API for a single square image
    pub async fn call_imagen(
        &self,
        model: &str,
        prompt: &str,
    ) -> Result<EncodedImage, GenerationError> {
        let url = self.gemini_endpoint(model, "predict")?;
        let request = ImagenRequest {
            instances: vec![ImagenInstance {
                prompt: prompt.to_string(),
            }],
            parameters: ImagenParameters {
                sample_count: 1,
                aspect_ratio: "1:1".to_string(),
                output_mime_type: "image/jpeg".to_string(),
            },
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status { status, body });
        }

        let imagen: ImagenResponse = response.json().await?;
        imagen
            .predictions
            .into_iter()
            .find_map(|p| {
                p.bytes_base64_encoded
                    .filter(|b| !b.is_empty())
                    .map(|b| EncodedImage::new(p.mime_type.unwrap_or_else(|| "image/jpeg".into()), b))
            })
            .ok_or_else(|| GenerationError::NoImageData(model.to_string()))
    }

    /// Start a `generateContent` call
    ///
    /// # Example
    /// ```ignore
    /// let client = Client::new().with_gemini("your-api-key");
    /// let response = client
    ///     .gemini_generate("gemini-2.5-flash-image")
    ///     .text("Put the character in a denim jacket")
    ///     .image(&source)
    ///     .await?;
    /// ```
    pub fn gemini_generate(&self, model: impl Into<String>) -> GeminiGenerateBuilder<'_, S> {
        GeminiGenerateBuilder::new(self, model)
    }
}
