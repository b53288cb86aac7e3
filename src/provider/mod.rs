//! Generation backends behind one capability trait.
//!
//! The orchestrator only sees [`GenerationProvider`]; which implementation
//! serves requests is decided once from [`Settings`].

#[cfg(feature = "cloud")]
pub mod cloud;
#[cfg(feature = "local")]
pub mod local;

use async_trait::async_trait;
use std::sync::Arc;

use crate::character::{BaseModelRequest, GenerationRequest};
use crate::config::{ProviderKind, Settings};
use crate::error::GenerationError;
use crate::image::EncodedImage;

#[cfg(feature = "cloud")]
pub use cloud::{AttemptRecord, CloudApi, CloudProvider};
#[cfg(feature = "local")]
pub use local::LocalProvider;

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    /// Full-body base character from the trait snapshot.
    async fn generate_base_model(
        &self,
        request: &BaseModelRequest,
    ) -> Result<EncodedImage, GenerationError>;

    /// The source character wearing the requested outfit.
    async fn generate_outfit(
        &self,
        request: &GenerationRequest,
    ) -> Result<EncodedImage, GenerationError>;

    /// Expand a terse outfit description. Falls back to the input text on
    /// failure; only configuration errors are returned.
    async fn enhance_prompt(&self, text: &str) -> Result<String, GenerationError>;

    /// Describe the character's look and suggest outfit changes.
    async fn analyze_image(&self, image: &EncodedImage) -> Result<String, GenerationError>;
}

/// Build the provider selected by `settings.provider`.
pub fn from_settings(settings: &Settings) -> Result<Arc<dyn GenerationProvider>, GenerationError> {
    settings.validate()?;
    match settings.provider {
        #[cfg(feature = "cloud")]
        ProviderKind::Cloud => Ok(Arc::new(CloudProvider::from_settings(settings))),
        #[cfg(feature = "local")]
        ProviderKind::Local => Ok(Arc::new(LocalProvider::from_settings(settings)?)),
        #[allow(unreachable_patterns)]
        other => Err(GenerationError::InvalidConfig(format!(
            "provider {:?} is not compiled into this build",
            other
        ))),
    }
}
