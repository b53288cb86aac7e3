//! Process-wide settings, read once at startup.
//!
//! Adapters are built from a [`Settings`] value passed in explicitly; changing
//! an endpoint means building new adapters (see
//! [`GenerationOrchestrator::rebuild`](crate::orchestrator::GenerationOrchestrator::rebuild)).

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::GenerationError;
use crate::retry::RetryPolicy;

/// Which adapter set serves requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Cloud,
    Local,
}

impl FromStr for ProviderKind {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cloud" | "gemini" => Ok(ProviderKind::Cloud),
            "local" | "comfy" | "comfyui" => Ok(ProviderKind::Local),
            other => Err(GenerationError::InvalidConfig(format!(
                "unknown provider '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CloudSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Image-edit models, in priority order.
    pub edit_models: Vec<String>,
    /// Imagen text-to-image models, tried first on the text-to-image fallback.
    pub imagen_models: Vec<String>,
    /// Gemini models used for text-to-image once Imagen is exhausted.
    pub text_to_image_models: Vec<String>,
    /// Text/vision model for prompt enhancement and image analysis.
    pub text_model: String,
    pub thinking_budget: Option<u32>,
}

impl Default for CloudSettings {
    fn default() -> Self {
        let gemini_image = vec![
            "gemini-2.5-flash-image".to_string(),
            "gemini-3-pro-image-preview".to_string(),
        ];
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            edit_models: gemini_image.clone(),
            imagen_models: vec![
                "imagen-4.0-generate-001".to_string(),
                "imagen-3.0-generate-001".to_string(),
            ],
            text_to_image_models: gemini_image,
            text_model: "gemini-3-pro-preview".to_string(),
            thinking_budget: Some(32768),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocalSettings {
    pub comfy_url: String,
    pub lm_studio_url: String,
    pub lm_studio_model: String,
    /// Directory holding `text_to_image.json` / `image_to_image.json`;
    /// the embedded templates are used when unset.
    pub workflow_dir: Option<PathBuf>,
    /// No timeout when unset: a hung job waits forever.
    pub completion_timeout_secs: Option<u64>,
    /// Fixed sampler seed. Unset means a fresh random seed per job.
    pub seed: Option<u64>,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            comfy_url: "http://127.0.0.1:8188".to_string(),
            lm_studio_url: "http://localhost:1234/v1".to_string(),
            lm_studio_model: "local-model".to_string(),
            workflow_dir: None,
            completion_timeout_secs: None,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub provider: ProviderKind,
    pub cloud: CloudSettings,
    pub local: LocalSettings,
    pub retry: RetryPolicy,
}

impl Settings {
    /// Load settings from the environment, reading a `.env` file first if one
    /// exists.
    pub fn from_env() -> Result<Self, GenerationError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup, starting from defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GenerationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut settings = Settings::default();

        if let Some(provider) = get("ATELIER_PROVIDER") {
            settings.provider = provider.parse()?;
        }

        settings.cloud.api_key = get("GEMINI_API_KEY").or_else(|| get("API_KEY"));
        if let Some(url) = get("GEMINI_BASE_URL") {
            settings.cloud.base_url = url;
        }

        if let Some(url) = get("COMFY_API_URL") {
            settings.local.comfy_url = url;
        }
        if let Some(url) = get("LM_STUDIO_API_URL") {
            settings.local.lm_studio_url = url;
        }
        if let Some(dir) = get("ATELIER_WORKFLOW_DIR") {
            settings.local.workflow_dir = Some(PathBuf::from(dir));
        }
        if let Some(secs) = get("ATELIER_COMPLETION_TIMEOUT_SECS") {
            settings.local.completion_timeout_secs =
                Some(parse_number("ATELIER_COMPLETION_TIMEOUT_SECS", &secs)?);
        }
        if let Some(seed) = get("ATELIER_SEED") {
            settings.local.seed = Some(parse_number("ATELIER_SEED", &seed)?);
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings no adapter could work with. A missing API key is not
    /// checked here: it only matters once the cloud adapter is used.
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.retry.max_attempts == 0 {
            return Err(GenerationError::InvalidConfig(
                "retry.maxAttempts must be at least 1".to_string(),
            ));
        }
        let urls = [
            ("cloud.baseUrl", &self.cloud.base_url),
            ("local.comfyUrl", &self.local.comfy_url),
            ("local.lmStudioUrl", &self.local.lm_studio_url),
        ];
        for (name, value) in urls {
            url::Url::parse(value).map_err(|e| {
                GenerationError::InvalidConfig(format!("{} '{}' is not a valid URL: {}", name, value, e))
            })?;
        }
        if self.cloud.edit_models.is_empty() {
            return Err(GenerationError::InvalidConfig(
                "cloud.editModels must name at least one model".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, GenerationError> {
    value.trim().parse().map_err(|_| {
        GenerationError::InvalidConfig(format!("{} must be a number, got '{}'", key, value))
    })
}
