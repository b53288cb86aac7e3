//! Single entry point for callers.
//!
//! Holds the provider selected at startup and runs each request through it,
//! logging the lifecycle. Every call ends in exactly one image (or text) or
//! exactly one error.

use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::character::{BaseModelRequest, CharacterTraits, GenerationRequest};
use crate::config::Settings;
use crate::error::GenerationError;
use crate::image::EncodedImage;
use crate::provider::{self, GenerationProvider};

pub struct GenerationOrchestrator {
    provider: Arc<dyn GenerationProvider>,
}

impl GenerationOrchestrator {
    /// Build the provider named by `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self, GenerationError> {
        let provider = provider::from_settings(settings)?;
        log::info!("Using {} generation provider", provider.name());
        Ok(Self { provider })
    }

    pub fn with_provider(provider: Arc<dyn GenerationProvider>) -> Self {
        Self { provider }
    }

    /// Replace the provider with one built from new settings. On error the
    /// current provider stays in place.
    pub fn rebuild(&mut self, settings: &Settings) -> Result<(), GenerationError> {
        let provider = provider::from_settings(settings)?;
        log::info!(
            "Switching generation provider: {} -> {}",
            self.provider.name(),
            provider.name()
        );
        self.provider = provider;
        Ok(())
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub async fn generate_outfit(
        &self,
        request: &GenerationRequest,
    ) -> Result<EncodedImage, GenerationError> {
        let id = Uuid::new_v4();
        let started = Instant::now();
        log::info!(
            "[{}] outfit generation via {} (scene: {})",
            id,
            self.provider.name(),
            request.scene
        );
        let result = self.provider.generate_outfit(request).await;
        finish(id, "outfit generation", started, &result);
        result
    }

    pub async fn generate_base_model(
        &self,
        request: &BaseModelRequest,
    ) -> Result<EncodedImage, GenerationError> {
        let id = Uuid::new_v4();
        let started = Instant::now();
        log::info!("[{}] base model generation via {}", id, self.provider.name());
        let result = self.provider.generate_base_model(request).await;
        finish(id, "base model generation", started, &result);
        result
    }

    pub async fn enhance_prompt(&self, text: &str) -> Result<String, GenerationError> {
        let id = Uuid::new_v4();
        let started = Instant::now();
        log::debug!("[{}] prompt enhancement via {}", id, self.provider.name());
        let result = self.provider.enhance_prompt(text).await;
        finish(id, "prompt enhancement", started, &result);
        result
    }

    pub async fn analyze_image(&self, image: &EncodedImage) -> Result<String, GenerationError> {
        let id = Uuid::new_v4();
        let started = Instant::now();
        log::info!("[{}] image analysis via {}", id, self.provider.name());
        let result = self.provider.analyze_image(image).await;
        finish(id, "image analysis", started, &result);
        result
    }

    /// Outfit change on data-URI strings: parses the source image and
    /// returns the result as a data URI.
    pub async fn generate_outfit_uri(
        &self,
        source_image: &str,
        outfit: &str,
        traits: &CharacterTraits,
        scene: &str,
    ) -> Result<String, GenerationError> {
        let request = GenerationRequest::new(EncodedImage::parse(source_image)?, outfit, traits.clone())
            .with_scene(scene);
        Ok(self.generate_outfit(&request).await?.to_data_uri())
    }

    /// Base model on data-URI strings.
    pub async fn generate_base_model_uri(
        &self,
        source_image: &str,
        traits: &CharacterTraits,
    ) -> Result<String, GenerationError> {
        let request = BaseModelRequest::new(EncodedImage::parse(source_image)?, traits.clone());
        Ok(self.generate_base_model(&request).await?.to_data_uri())
    }
}

fn finish<T>(id: Uuid, what: &str, started: Instant, result: &Result<T, GenerationError>) {
    let elapsed = started.elapsed().as_millis();
    match result {
        Ok(_) => log::info!("[{}] {} finished in {}ms", id, what, elapsed),
        Err(err) => log::error!(
            "[{}] {} failed after {}ms ({:?}): {}",
            id,
            what,
            elapsed,
            err.class(),
            err
        ),
    }
}
