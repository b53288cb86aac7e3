//! HTTP clients for the hosted and local model services.
//!
//! A single [`Client`] wraps `reqwest::Client` and uses a typestate to track
//! which services are configured, so calling an unconfigured service does
//! not compile.

pub mod gemini;
pub mod lm_studio;

use std::marker::PhantomData;

pub use gemini::{
    Gemini, GeminiConfig, GeminiContent, GeminiGenerationConfig, GeminiPart, GeminiResponse,
    SafetySetting,
};
pub use lm_studio::{ChatContent, ChatMessage, ContentPart, LmStudio, LmStudioConfig};

/// HTTP client wrapper around reqwest::Client
/// Uses typestate pattern to track which providers are configured
#[derive(Clone)]
pub struct Client<S> {
    /// The underlying HTTP client
    pub(crate) client: reqwest::Client,
    /// Marker for the current state (which providers are enabled)
    pub(crate) state: PhantomData<S>,
    /// Gemini configuration
    pub(crate) gemini_config: Option<GeminiConfig>,
    /// LM Studio configuration
    pub(crate) lm_studio_config: Option<LmStudioConfig>,
}

// ============================================================================
// Type States
// ============================================================================

/// Marker indicating a provider is enabled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Enabled;

/// Marker indicating a provider is disabled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Disabled;

/// Provider state container
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Providers<GeminiState, LmStudioState> {
    _gemini: PhantomData<GeminiState>,
    _lm_studio: PhantomData<LmStudioState>,
}

/// Trait to check if a provider is available on this client
pub trait HasProvider<Provider> {}

/// Gemini is available when the first type param is Enabled
impl<L> HasProvider<Gemini> for Providers<Enabled, L> {}

/// LM Studio is available when the second type param is Enabled
impl<G> HasProvider<LmStudio> for Providers<G, Enabled> {}

/// A client that can only talk to Gemini.
pub type GeminiClient = Client<Providers<Enabled, Disabled>>;

/// A client that can only talk to LM Studio.
pub type LmStudioClient = Client<Providers<Disabled, Enabled>>;

// ============================================================================
// Client constructors and builders
// ============================================================================

impl Client<Providers<Disabled, Disabled>> {
    /// Create a new client with no providers configured
    pub fn new() -> Self {
        Self::with_http(reqwest::Client::new())
    }

    /// Create a client around an existing `reqwest::Client`
    pub fn with_http(client: reqwest::Client) -> Self {
        Client {
            client,
            state: PhantomData,
            gemini_config: None,
            lm_studio_config: None,
        }
    }
}

impl Default for Client<Providers<Disabled, Disabled>> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L> Client<Providers<Disabled, L>> {
    /// Enable Gemini with the public endpoint
    pub fn with_gemini(self, api_key: impl Into<String>) -> Client<Providers<Enabled, L>> {
        self.with_gemini_at(api_key, "https://generativelanguage.googleapis.com")
    }

    /// Enable Gemini with a custom base URL
    pub fn with_gemini_at(
        self,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Client<Providers<Enabled, L>> {
        Client {
            client: self.client,
            state: PhantomData,
            gemini_config: Some(GeminiConfig {
                api_key: api_key.into(),
                base_url: trim_base(base_url.into()),
            }),
            lm_studio_config: self.lm_studio_config,
        }
    }
}

impl<G> Client<Providers<G, Disabled>> {
    /// Enable LM Studio at the default address (http://localhost:1234/v1)
    pub fn with_lm_studio(self) -> Client<Providers<G, Enabled>> {
        self.with_lm_studio_at("http://localhost:1234/v1")
    }

    /// Enable LM Studio (or any OpenAI-compatible server) at a custom base URL
    pub fn with_lm_studio_at(self, base_url: impl Into<String>) -> Client<Providers<G, Enabled>> {
        Client {
            client: self.client,
            state: PhantomData,
            gemini_config: self.gemini_config,
            lm_studio_config: Some(LmStudioConfig {
                base_url: trim_base(base_url.into()),
                ..Default::default()
            }),
        }
    }
}

impl<G> Client<Providers<G, Enabled>> {
    /// Update the model name sent with chat requests
    pub fn edit_lm_studio_default_model(&mut self, model: impl Into<String>) {
        if let Some(ref mut config) = self.lm_studio_config {
            config.default_model = model.into();
        }
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

// ============================================================================
// Deref to reqwest::Client for direct HTTP usage
// ============================================================================

impl<S> std::ops::Deref for Client<S> {
    type Target = reqwest::Client;
    fn deref(&self) -> &Self::Target {
        &self.client
    }
}
