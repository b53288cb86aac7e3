//! # Atelier
//!
//! Prompt construction and multi-provider image generation for character
//! outfit visualisation.
//!
//! ## Features
//!
//! - **Content-aware prompts**: outfit and base-character prompts built from a
//!   trait snapshot, with ordered rewrite tables for relaxed and restrictive
//!   content modes
//! - **Cloud provider** (`cloud`): Gemini image-edit models with sanitized
//!   retries, then Imagen / Gemini text-to-image fallback, with bounded
//!   exponential backoff on quota and transient errors
//! - **Local provider** (`local`): a ComfyUI-style engine driven by workflow
//!   templates, plus LM Studio for prompt enhancement and image analysis
//! - **One entry point**: [`GenerationOrchestrator`] picks the provider from
//!   [`Settings`] and can be rebuilt when settings change
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use atelier::prelude::*;
//!
//! # async fn run() -> Result<(), GenerationError> {
//! let settings = Settings::from_env()?;
//! let orchestrator = GenerationOrchestrator::from_settings(&settings)?;
//!
//! let traits = CharacterTraits::default();
//! let source = EncodedImage::parse("data:image/png;base64,iVBORw0KGgo=")?;
//! let request = GenerationRequest::new(source, "a denim jacket over a white tee", traits)
//!     .with_scene("Cyberpunk City");
//!
//! let image = orchestrator.generate_outfit(&request).await?;
//! println!("{}", image.to_data_uri().len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`prompt`]: prompt builders and rewrite tables
//! - [`provider`]: the provider trait and its cloud / local implementations
//! - [`llm`]: HTTP clients for Gemini and LM Studio
//! - [`workflow`]: workflow templates, node schema and job conversion
//! - [`comfy`]: execution-engine client and completion routing (`local`)

pub mod character;
pub mod config;
pub mod error;
pub mod image;
pub mod llm;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod retry;
pub mod workflow;

#[cfg(feature = "local")]
pub mod comfy;

#[cfg(test)]
mod test_support;

// ============================================================================
// Public Re-exports
// ============================================================================

pub use character::{BaseModelRequest, CharacterTraits, GenerationRequest, RenderStyle};
pub use config::{CloudSettings, LocalSettings, ProviderKind, Settings};
pub use error::{ErrorClass, GenerationError};
pub use image::EncodedImage;
pub use orchestrator::GenerationOrchestrator;
pub use provider::GenerationProvider;
pub use retry::RetryPolicy;

#[cfg(feature = "cloud")]
pub use provider::CloudProvider;
#[cfg(feature = "local")]
pub use provider::LocalProvider;

/// Commonly used types.
///
/// # Example
/// ```rust
/// use atelier::prelude::*;
/// ```
pub mod prelude {
    pub use super::{
        BaseModelRequest, CharacterTraits, EncodedImage, ErrorClass, GenerationError,
        GenerationOrchestrator, GenerationProvider, GenerationRequest, ProviderKind, RenderStyle,
        RetryPolicy, Settings,
    };
    pub use crate::prompt::{build_base_model_prompt, build_outfit_prompt};
}

// ============================================================================
// Library Metadata
// ============================================================================

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate.
pub const NAME: &str = env!("CARGO_PKG_NAME");
