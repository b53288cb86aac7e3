//! Local provider: a ComfyUI-style engine for images, LM Studio for text.

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

use super::GenerationProvider;
use crate::character::{BaseModelRequest, CharacterTraits, GenerationRequest};
use crate::comfy::ExecutionClient;
use crate::config::{LocalSettings, Settings};
use crate::error::GenerationError;
use crate::image::EncodedImage;
use crate::llm::{ChatMessage, Client, LmStudioClient};
use crate::prompt::{compact_base_prompt, compact_outfit_prompt};
use crate::workflow::{
    ExecutableJob, LOAD_IMAGE_NODE, POSITIVE_PROMPT_NODE, SAMPLER_NODE, SEED_RANGE, WorkflowGraph,
    WorkflowTemplate,
};

const ENHANCE_SYSTEM_PROMPT: &str = "You are a fashion design assistant. Expand the given outfit description for a highly detailed image generation prompt. Focus on fabrics, textures, fit, and lighting. Keep it under 60 words.";

const ANALYZE_PROMPT: &str = "Analyze this character's appearance and outfit. Describe the style, key items, materials, and overall vibe. Suggest 3 specific outfit changes.";

pub struct LocalProvider {
    engine: ExecutionClient,
    chat: LmStudioClient,
    settings: LocalSettings,
}

impl LocalProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self, GenerationError> {
        let engine = ExecutionClient::new(&settings.local.comfy_url)?;
        let mut chat = Client::new().with_lm_studio_at(settings.local.lm_studio_url.clone());
        chat.edit_lm_studio_default_model(settings.local.lm_studio_model.clone());
        Ok(Self {
            engine,
            chat,
            settings: settings.local.clone(),
        })
    }

    pub fn engine(&self) -> &ExecutionClient {
        &self.engine
    }

    fn seed(&self) -> u64 {
        self.settings
            .seed
            .unwrap_or_else(|| rand::thread_rng().gen_range(0..SEED_RANGE))
    }

    fn timeout(&self) -> Option<Duration> {
        self.settings.completion_timeout_secs.map(Duration::from_secs)
    }

    /// Load `template`, inject prompt, seed and (for image-to-image) the
    /// uploaded image name, and convert it to a job.
    pub async fn prepare_job(
        &self,
        template: WorkflowTemplate,
        prompt: &str,
        image_name: Option<&str>,
    ) -> Result<ExecutableJob, GenerationError> {
        let mut graph = WorkflowGraph::load(template, self.settings.workflow_dir.as_deref()).await?;
        graph.set_widget(POSITIVE_PROMPT_NODE, 0, prompt)?;
        graph.set_widget(SAMPLER_NODE, 0, self.seed())?;
        if let Some(name) = image_name {
            graph.set_widget(LOAD_IMAGE_NODE, 0, name)?;
        }
        graph.to_job()
    }

    pub async fn prepare_base_job(&self, traits: &CharacterTraits) -> Result<ExecutableJob, GenerationError> {
        self.prepare_job(WorkflowTemplate::TextToImage, &compact_base_prompt(traits), None)
            .await
    }
}

#[async_trait]
impl GenerationProvider for LocalProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn generate_base_model(
        &self,
        request: &BaseModelRequest,
    ) -> Result<EncodedImage, GenerationError> {
        let job = self.prepare_base_job(&request.traits).await?;
        self.engine.run_job(&job, self.timeout()).await
    }

    async fn generate_outfit(
        &self,
        request: &GenerationRequest,
    ) -> Result<EncodedImage, GenerationError> {
        let image_name = self.engine.upload_image(&request.source_image).await?;
        let prompt = compact_outfit_prompt(&request.outfit, &request.traits, &request.scene);
        let job = self
            .prepare_job(WorkflowTemplate::ImageToImage, &prompt, Some(&image_name))
            .await?;
        self.engine.run_job(&job, self.timeout()).await
    }

    async fn enhance_prompt(&self, text: &str) -> Result<String, GenerationError> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        let messages = vec![ChatMessage::system(ENHANCE_SYSTEM_PROMPT), ChatMessage::user(text)];
        match self.chat.chat_completion(messages, None).await {
            Ok(enhanced) if !enhanced.trim().is_empty() => Ok(enhanced.trim().to_string()),
            Ok(_) => Ok(text.to_string()),
            Err(err) => {
                log::warn!("Local prompt enhancement failed, keeping original text: {}", err);
                Ok(text.to_string())
            }
        }
    }

    async fn analyze_image(&self, image: &EncodedImage) -> Result<String, GenerationError> {
        self.chat
            .analyze_image(image, ANALYZE_PROMPT)
            .await
            .map_err(|err| {
                log::error!("Local vision analysis failed: {}", err);
                GenerationError::AnalysisFailed(format!(
                    "{} (is a vision model loaded in LM Studio?)",
                    err
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider(seed: Option<u64>) -> LocalProvider {
        let mut settings = Settings::default();
        settings.local.seed = seed;
        LocalProvider::from_settings(&settings).unwrap()
    }

    #[tokio::test]
    async fn test_base_job_injects_prompt_and_seed() {
        let local = provider(Some(7));
        let traits = CharacterTraits {
            hair_color: "Silver".into(),
            ..Default::default()
        };
        let job = local.prepare_base_job(&traits).await.unwrap();

        let text = job["45"].inputs["text"].as_str().unwrap();
        assert!(text.contains("Silver hair"));
        assert_eq!(job["44"].inputs["seed"], json!(7));
        assert_eq!(job["44"].inputs["positive"], json!(["45", 0]));
        assert!(!job.contains_key("100"));
    }

    #[tokio::test]
    async fn test_outfit_job_references_uploaded_image() {
        let local = provider(None);
        let job = local
            .prepare_job(
                WorkflowTemplate::ImageToImage,
                "Character wearing a trench coat. High quality, detailed.",
                Some("upload_1700000000000.png"),
            )
            .await
            .unwrap();

        assert_eq!(job["100"].inputs["image"], json!("upload_1700000000000.png"));
        assert_eq!(job["101"].inputs["pixels"], json!(["100", 0]));
        let seed = job["44"].inputs["seed"].as_u64().unwrap();
        assert!(seed < SEED_RANGE);
    }

    #[tokio::test]
    async fn test_text_to_image_template_has_no_image_slot() {
        let local = provider(None);
        let err = local
            .prepare_job(WorkflowTemplate::TextToImage, "x", Some("a.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::WorkflowError(_)));
    }

    #[tokio::test]
    async fn test_enhance_empty_input() {
        let local = provider(None);
        assert_eq!(local.enhance_prompt("").await.unwrap(), "");
    }
}
