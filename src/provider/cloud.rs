//! Hosted multimodal provider with layered fallback.
//!
//! Per call:
//!
//! 1. Each edit model in order, with the source image. A safety-class
//!    failure gets one retry on the same model with the sanitized prompt;
//!    any other failure moves on to the next model.
//! 2. Once the edit models are exhausted, text-to-image: Imagen models,
//!    then the Gemini text-to-image models. If the last failure there is
//!    safety-class, the whole text-to-image pass runs once more with the
//!    sanitized prompt.
//!
//! Quota and transient failures are retried in place by the
//! [`RetryPolicy`] before a step counts as failed. Configuration errors
//! abort the chain at once.

use async_trait::async_trait;

use super::GenerationProvider;
use crate::character::{BaseModelRequest, GenerationRequest};
use crate::config::{CloudSettings, Settings};
use crate::error::GenerationError;
use crate::image::EncodedImage;
use crate::llm::{Client, Gemini, GeminiClient, HasProvider, SafetySetting};
use crate::prompt::{build_base_model_prompt, build_outfit_prompt};
use crate::retry::RetryPolicy;

const ENHANCE_INSTRUCTION: &str = "Focus on materials, textures, lighting, and specific fashion terminology. Keep it under 60 words.";

const ANALYZE_INSTRUCTION: &str = "Analyze this character's appearance and outfit in detail. Describe the style, key fashion items, materials, colors, and the overall vibe. Suggest 3 specific outfit changes or improvements that would fit this character's aesthetic.";

/// The hosted endpoints the fallback chain needs. Implemented for the
/// Gemini-enabled [`Client`]; tests script it.
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Image from a multimodal model, optionally editing `source`.
    async fn generate_image(
        &self,
        model: &str,
        prompt: &str,
        source: Option<&EncodedImage>,
        safety: &[SafetySetting],
    ) -> Result<EncodedImage, GenerationError>;

    /// Image from a dedicated text-to-image model.
    async fn generate_imagen(&self, model: &str, prompt: &str) -> Result<EncodedImage, GenerationError>;

    /// Text answer; `None` when the model returned no text.
    async fn generate_text(
        &self,
        model: &str,
        prompt: &str,
        image: Option<&EncodedImage>,
        thinking_budget: Option<u32>,
    ) -> Result<Option<String>, GenerationError>;
}

#[async_trait]
impl<S> CloudApi for Client<S>
where
    S: HasProvider<Gemini> + Send + Sync + 'static,
{
    async fn generate_image(
        &self,
        model: &str,
        prompt: &str,
        source: Option<&EncodedImage>,
        safety: &[SafetySetting],
    ) -> Result<EncodedImage, GenerationError> {
        let mut call = self.gemini_generate(model).text(prompt).with_image_output();
        if let Some(image) = source {
            call = call.image(image);
        }
        call.safety_settings(safety.to_vec()).await?.into_image(model)
    }

    async fn generate_imagen(&self, model: &str, prompt: &str) -> Result<EncodedImage, GenerationError> {
        self.call_imagen(model, prompt).await
    }

    async fn generate_text(
        &self,
        model: &str,
        prompt: &str,
        image: Option<&EncodedImage>,
        thinking_budget: Option<u32>,
    ) -> Result<Option<String>, GenerationError> {
        let mut call = self.gemini_generate(model);
        if let Some(image) = image {
            call = call.image(image);
        }
        call = call.text(prompt);
        if let Some(budget) = thinking_budget {
            call = call.thinking_budget(budget);
        }
        Ok(call.await?.text())
    }
}

/// What one orchestrated call tried. Each call gets its own record.
#[derive(Debug, Default)]
pub struct AttemptRecord {
    /// Every model attempted, in order; sanitized retries appear twice.
    pub tried_models: Vec<String>,
    /// Same-model retries with the sanitized prompt after a safety block.
    pub sanitized_retries: u32,
    /// Whether the text-to-image fallback ran.
    pub used_text_to_image: bool,
    /// Whether the text-to-image fallback was re-run with the sanitized prompt.
    pub sanitized_text_to_image: bool,
    pub last_error: Option<String>,
}

impl AttemptRecord {
    fn fail(&mut self, err: &GenerationError) {
        self.last_error = Some(err.to_string());
    }
}

pub struct CloudProvider<A = GeminiClient> {
    api: A,
    settings: CloudSettings,
    retry: RetryPolicy,
}

impl CloudProvider<GeminiClient> {
    /// Gemini-backed provider. A missing API key is reported by the first call.
    pub fn from_settings(settings: &Settings) -> Self {
        let api = Client::new().with_gemini_at(
            settings.cloud.api_key.clone().unwrap_or_default(),
            settings.cloud.base_url.clone(),
        );
        Self::new(api, settings.cloud.clone(), settings.retry)
    }
}

impl<A: CloudApi> CloudProvider<A> {
    pub fn new(api: A, settings: CloudSettings, retry: RetryPolicy) -> Self {
        Self {
            api,
            settings,
            retry,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Outfit change, returning the attempt record alongside the result.
    pub async fn generate_outfit_recorded(
        &self,
        request: &GenerationRequest,
    ) -> (AttemptRecord, Result<EncodedImage, GenerationError>) {
        let mut record = AttemptRecord::default();
        let prompt_for = |sanitized: bool| {
            build_outfit_prompt(&request.outfit, &request.traits, &request.scene, sanitized)
        };
        let result = self
            .run_chain(
                "outfit",
                &request.source_image,
                request.traits.is_relaxed(),
                &prompt_for,
                &mut record,
            )
            .await;
        (record, result)
    }

    /// Base model, returning the attempt record alongside the result.
    pub async fn generate_base_model_recorded(
        &self,
        request: &BaseModelRequest,
    ) -> (AttemptRecord, Result<EncodedImage, GenerationError>) {
        let mut record = AttemptRecord::default();
        let prompt_for = |safe_mode: bool| build_base_model_prompt(&request.traits, safe_mode);
        let result = self
            .run_chain(
                "base model",
                &request.source_image,
                request.traits.is_relaxed(),
                &prompt_for,
                &mut record,
            )
            .await;
        (record, result)
    }

    async fn run_chain<P>(
        &self,
        label: &str,
        source: &EncodedImage,
        relaxed: bool,
        prompt_for: &P,
        record: &mut AttemptRecord,
    ) -> Result<EncodedImage, GenerationError>
    where
        P: Fn(bool) -> String + Sync,
    {
        let safety = SafetySetting::for_content_mode(relaxed);

        for model in &self.settings.edit_models {
            record.tried_models.push(model.clone());
            let err = match self.edit(model, &prompt_for(false), source, &safety).await {
                Ok(image) => {
                    log::info!("{}: generated with {}", label, model);
                    return Ok(image);
                }
                Err(err) => err,
            };
            if err.is_configuration() {
                return Err(err);
            }
            log::warn!("{}: model {} failed: {}", label, model, err);
            record.fail(&err);

            if !err.is_safety() {
                continue;
            }

            log::info!("{}: safety block on {}, retrying with sanitized prompt", label, model);
            record.sanitized_retries += 1;
            record.tried_models.push(model.clone());
            match self.edit(model, &prompt_for(true), source, &safety).await {
                Ok(image) => {
                    log::info!("{}: generated with {} (sanitized)", label, model);
                    return Ok(image);
                }
                Err(err) if err.is_configuration() => return Err(err),
                Err(err) => {
                    log::warn!("{}: sanitized retry on {} failed: {}", label, model, err);
                    record.fail(&err);
                }
            }
        }

        log::warn!("{}: edit models unavailable, switching to text-to-image", label);
        record.used_text_to_image = true;
        match self.text_to_image(label, &prompt_for(false), &safety, record).await {
            Err(err) if err.is_safety() => {
                log::info!("{}: text-to-image blocked, retrying with sanitized prompt", label);
                record.sanitized_text_to_image = true;
                self.text_to_image(label, &prompt_for(true), &safety, record)
                    .await
            }
            result => result,
        }
    }

    async fn edit(
        &self,
        model: &str,
        prompt: &str,
        source: &EncodedImage,
        safety: &[SafetySetting],
    ) -> Result<EncodedImage, GenerationError> {
        self.retry
            .run(model, || {
                self.api.generate_image(model, prompt, Some(source), safety)
            })
            .await
    }

    /// One pass over the text-to-image models. The last failure is returned
    /// when all of them fail.
    async fn text_to_image(
        &self,
        label: &str,
        prompt: &str,
        safety: &[SafetySetting],
        record: &mut AttemptRecord,
    ) -> Result<EncodedImage, GenerationError> {
        let mut last_error = None;

        for model in &self.settings.imagen_models {
            record.tried_models.push(model.clone());
            match self
                .retry
                .run(model, || self.api.generate_imagen(model, prompt))
                .await
            {
                Ok(image) => {
                    log::info!("{}: generated with {}", label, model);
                    return Ok(image);
                }
                Err(err) if err.is_configuration() => return Err(err),
                Err(err) => {
                    log::warn!("{}: imagen model {} failed: {}", label, model, err);
                    record.fail(&err);
                    last_error = Some(err);
                }
            }
        }

        for model in &self.settings.text_to_image_models {
            record.tried_models.push(model.clone());
            match self
                .retry
                .run(model, || self.api.generate_image(model, prompt, None, safety))
                .await
            {
                Ok(image) => {
                    log::info!("{}: generated with {} (text-to-image)", label, model);
                    return Ok(image);
                }
                Err(err) if err.is_configuration() => return Err(err),
                Err(err) => {
                    log::warn!("{}: {} text-to-image failed: {}", label, model, err);
                    record.fail(&err);
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            GenerationError::NoImageData("text-to-image fallback (no models configured)".to_string())
        }))
    }
}

#[async_trait]
impl<A: CloudApi> GenerationProvider for CloudProvider<A> {
    fn name(&self) -> &'static str {
        "cloud"
    }

    async fn generate_base_model(
        &self,
        request: &BaseModelRequest,
    ) -> Result<EncodedImage, GenerationError> {
        let (record, result) = self.generate_base_model_recorded(request).await;
        log::debug!("base model attempts: {:?}", record);
        result
    }

    async fn generate_outfit(
        &self,
        request: &GenerationRequest,
    ) -> Result<EncodedImage, GenerationError> {
        let (record, result) = self.generate_outfit_recorded(request).await;
        log::debug!("outfit attempts: {:?}", record);
        result
    }

    async fn enhance_prompt(&self, text: &str) -> Result<String, GenerationError> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }

        let prompt = format!(
            "Expand this outfit description for a 3D character render: \"{}\". {}",
            text, ENHANCE_INSTRUCTION
        );
        let model = &self.settings.text_model;
        let result = self
            .retry
            .run("enhance", || {
                self.api
                    .generate_text(model, &prompt, None, self.settings.thinking_budget)
            })
            .await;

        match result {
            Ok(Some(enhanced)) => Ok(enhanced),
            Ok(None) => Ok(text.to_string()),
            Err(err) if err.is_configuration() => Err(err),
            Err(err) => {
                log::warn!("Prompt enhancement failed, keeping original text: {}", err);
                Ok(text.to_string())
            }
        }
    }

    async fn analyze_image(&self, image: &EncodedImage) -> Result<String, GenerationError> {
        let model = &self.settings.text_model;
        let result = self
            .retry
            .run("analyze", || {
                self.api.generate_text(
                    model,
                    ANALYZE_INSTRUCTION,
                    Some(image),
                    self.settings.thinking_budget,
                )
            })
            .await;

        match result {
            Ok(text) => Ok(text.unwrap_or_else(|| "No analysis generated.".to_string())),
            Err(err) if err.is_configuration() => Err(err),
            Err(err) => {
                log::error!("Analysis failed: {}", err);
                Err(GenerationError::AnalysisFailed(err.to_string()))
            }
        }
    }
}
