//! Prompt construction.
//!
//! Pure functions from a character snapshot plus outfit/scene text to the
//! final natural-language prompt. No I/O; identical inputs always give an
//! identical string.

pub mod physique;
pub mod rewrite;

pub use physique::{body_part_descriptor, Physique};
pub use rewrite::{elevate, sanitize, PromptVariant, RewriteRule};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::character::{CharacterTraits, ORIGINAL, RenderStyle};

const MODEST_OUTFIT_STYLE: &str = "Digital fashion illustration, artistic, clean lines, modest, family friendly, highly detailed.";

const PHOTOREAL_OUTFIT_STYLE: &str = "Art Style: High-Fidelity 3D Virtual Human, Cinematic Fashion Photography, Vogue Editorial.
Technical: 8k resolution, raytracing, subsurface scattering, detailed skin texture (pores, blemishes), sharp focus, 85mm lens, f/1.8, natural lighting.
Vibe: Alluring, confident, masterpiece, bold fashion statement.";

const ANIME_OUTFIT_STYLE: &str = "Art Style: High-quality anime masterpiece, Seinen aesthetic, key visual, intricate details.
Technical: Detailed lineart, cel shading, vibrant colors, expressive eyes, depth of field, 4k.
Vibe: Alluring, confident, ecchi artistic style, mature.";

const MODEST_BASE_STYLE: &str =
    "Character design, digital illustration, simple, modest, flat lighting.";

const PHOTOREAL_BASE_STYLE: &str = "High-Fidelity 3D Render, Unreal Engine 5, Cinematic Lighting, Detailed Skin Texture, Fashion Editorial, 8k, raw photo, 85mm lens, f/1.8";

const ANIME_BASE_STYLE: &str = "High-quality anime masterpiece, 2D digital illustration, detailed shading, alluring, ecchi style, key visual, seinen aesthetic";

const CAMERA_CLAUSE: &str = "Camera: Full body portrait shot, eye level, centered composition.";

const SAFE_UNDERWEAR: &str = "Simple Swimsuit";

/// Whole words naming sunlight; "tsunami" or "sunken" do not count.
static SUNLIT_SCENE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)\b(sun|suns|sunny|sunlit|sunlight|sunshine|sunset|sunsets|sunrise|sundown|golden hour)\b")
        .map_err(|e| log::error!("Invalid sunlit scene pattern: {}", e))
        .ok()
});

/// Lighting chosen from the scene name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lighting {
    NeonRim,
    StudioSoftbox,
    GoldenHour,
    Cinematic,
}

impl Lighting {
    pub fn for_scene(scene: &str) -> Self {
        let scene = normalize_scene(scene);
        let lower = scene.to_lowercase();
        if lower.contains("cyberpunk") {
            Lighting::NeonRim
        } else if scene == ORIGINAL || lower.contains("studio") {
            Lighting::StudioSoftbox
        } else if SUNLIT_SCENE.as_ref().is_some_and(|re| re.is_match(scene)) {
            Lighting::GoldenHour
        } else {
            Lighting::Cinematic
        }
    }

    pub fn clause(self) -> &'static str {
        match self {
            Lighting::NeonRim => {
                "Lighting: Neon rim lighting, high contrast, cyan and magenta hues, volumetric fog."
            }
            Lighting::StudioSoftbox => {
                "Lighting: Professional studio softbox, neutral color temperature, soft shadows."
            }
            Lighting::GoldenHour => {
                "Lighting: Natural golden hour sunlight, lens flare, warm atmosphere."
            }
            Lighting::Cinematic => "Lighting: Cinematic lighting, volumetric atmosphere.",
        }
    }
}

/// Blank scenes mean "keep the original background".
fn normalize_scene(scene: &str) -> &str {
    let trimmed = scene.trim();
    if trimmed.is_empty() { ORIGINAL } else { trimmed }
}

fn outfit_style(traits: &CharacterTraits) -> &'static str {
    if traits.is_restrictive() {
        return MODEST_OUTFIT_STYLE;
    }
    match traits.render_style {
        RenderStyle::Photorealistic => PHOTOREAL_OUTFIT_STYLE,
        RenderStyle::Anime => ANIME_OUTFIT_STYLE,
    }
}

fn consistency_clause(traits: &CharacterTraits) -> String {
    if traits.keeps_original_look() {
        "Maintain facial features and hair style exactly.".to_string()
    } else {
        format!(
            "Appearance: {} hair, {} skin tone. {} body.",
            traits.hair_color, traits.skin_tone, traits.body_type
        )
    }
}

fn scene_clause(scene: &str) -> String {
    let scene = normalize_scene(scene);
    if scene == ORIGINAL {
        "Background: Keep background simple and consistent.".to_string()
    } else {
        format!("Environment: {}. Detailed background.", scene)
    }
}

/// Rewrite the outfit text with the variant the content mode calls for.
pub fn rewrite_outfit(
    outfit: &str,
    traits: &CharacterTraits,
    force_sanitized: bool,
) -> (PromptVariant, String) {
    let variant = PromptVariant::select(traits.is_relaxed(), force_sanitized);
    (variant, variant.apply(outfit.trim()))
}

/// Build the outfit-change prompt.
///
/// `force_sanitized` is set on the retry after a safety block; it picks the
/// sanitizing rewrite even in relaxed mode. The style and physique clauses
/// still follow the content mode.
pub fn build_outfit_prompt(
    outfit: &str,
    traits: &CharacterTraits,
    scene: &str,
    force_sanitized: bool,
) -> String {
    let (_, description) = rewrite_outfit(outfit, traits, force_sanitized);

    let mut lines = vec![
        "Task: Change the character's outfit.".to_string(),
        format!("Outfit Description: {}.", description),
        outfit_style(traits).to_string(),
        Lighting::for_scene(scene).clause().to_string(),
        CAMERA_CLAUSE.to_string(),
    ];
    if traits.is_relaxed() {
        lines.push(format!("Physique: {}.", Physique::of(traits).clause()));
    }
    lines.push(consistency_clause(traits));
    lines.push(scene_clause(scene));
    lines.push(
        "Note: Ensure the outfit fits the character's physique perfectly. High quality generation."
            .to_string(),
    );
    lines.join("\n")
}

/// Build the full-body base character prompt.
///
/// `safe_mode` (or restrictive content mode) forces a neutral swimsuit and the
/// modest style block.
pub fn build_base_model_prompt(traits: &CharacterTraits, safe_mode: bool) -> String {
    let safe = safe_mode || traits.is_restrictive();
    let physique = Physique::of(traits);

    let underwear_color = non_empty_or(&traits.underwear_color, "Black");
    let underwear_style = if safe {
        SAFE_UNDERWEAR
    } else {
        traits
            .underwear_style
            .as_deref()
            .map(|s| non_empty_or(s, "Classic Set"))
            .unwrap_or("Classic Set")
    };

    let style = if safe {
        MODEST_BASE_STYLE
    } else {
        match traits.render_style {
            RenderStyle::Photorealistic => PHOTOREAL_BASE_STYLE,
            RenderStyle::Anime => ANIME_BASE_STYLE,
        }
    };

    let closing = if safe {
        "Safe for work."
    } else {
        "Detailed, confident, high fashion, masterpiece."
    };

    [
        "Create a full-body character design.".to_string(),
        format!("Style: {}.", style.trim_end_matches('.')),
        format!(
            "Subject: A female character, {} hair, {} skin, {} build.",
            traits.hair_color, traits.skin_tone, traits.body_type
        ),
        format!("Physique: {}.", physique.clause()),
        format!("Attire: Wearing {} {}.", underwear_color, underwear_style),
        format!("Pose: {}.", traits.pose),
        "Camera: Full body shot, front view, eye level.".to_string(),
        "Lighting: Professional studio lighting, softbox, rim light.".to_string(),
        "Background: Solid color studio background (for easy editing).".to_string(),
        closing.to_string(),
    ]
    .join("\n")
}

/// Terse base prompt for the local diffusion pipeline.
pub fn compact_base_prompt(traits: &CharacterTraits) -> String {
    let physique = Physique::of(traits);
    let underwear_style = if traits.is_restrictive() {
        SAFE_UNDERWEAR
    } else {
        traits
            .underwear_style
            .as_deref()
            .map(|s| non_empty_or(s, "Lingerie"))
            .unwrap_or("Lingerie")
    };
    format!(
        "Full body character design. Female, {} hair, {} skin, {} build. Physique: {}. Wearing {} {}. Pose: {}. High quality, detailed, masterpiece.",
        traits.hair_color,
        traits.skin_tone,
        traits.body_type,
        physique.clause(),
        non_empty_or(&traits.underwear_color, "Black"),
        underwear_style,
        traits.pose
    )
}

/// Terse outfit prompt for the local diffusion pipeline.
pub fn compact_outfit_prompt(outfit: &str, traits: &CharacterTraits, scene: &str) -> String {
    let (_, description) = rewrite_outfit(outfit, traits, false);
    let scene = normalize_scene(scene);
    if scene == ORIGINAL {
        format!("Character wearing {}. High quality, detailed.", description)
    } else {
        format!(
            "Character wearing {}. {}. High quality, detailed.",
            description, scene
        )
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() { fallback } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relaxed() -> CharacterTraits {
        CharacterTraits {
            nsfw: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_lighting_selection() {
        assert_eq!(Lighting::for_scene("Cyberpunk City"), Lighting::NeonRim);
        assert_eq!(Lighting::for_scene("White Studio"), Lighting::StudioSoftbox);
        assert_eq!(Lighting::for_scene("Original"), Lighting::StudioSoftbox);
        assert_eq!(Lighting::for_scene(""), Lighting::StudioSoftbox);
        assert_eq!(Lighting::for_scene("Sunny Beach"), Lighting::GoldenHour);
        assert_eq!(Lighting::for_scene("Space Station"), Lighting::Cinematic);
        assert_eq!(Lighting::for_scene("sunset pier"), Lighting::GoldenHour);
        assert_eq!(Lighting::for_scene("Beach at SUNRISE"), Lighting::GoldenHour);
        assert_eq!(Lighting::for_scene("Tsunami Coast"), Lighting::Cinematic);
        assert_eq!(Lighting::for_scene("Sunken Ship"), Lighting::Cinematic);
    }

    #[test]
    fn test_restrictive_mode_uses_modest_style_regardless_of_render_style() {
        let traits = CharacterTraits {
            render_style: RenderStyle::Photorealistic,
            ..Default::default()
        };
        let prompt = build_outfit_prompt("a red dress", &traits, "Original", false);
        assert!(prompt.contains("modest, family friendly"));
        assert!(!prompt.contains("Vogue"));
        assert!(!prompt.contains("Physique:"));
    }

    #[test]
    fn test_relaxed_mode_style_follows_render_style() {
        let mut traits = relaxed();
        let anime = build_outfit_prompt("a red dress", &traits, "Original", false);
        assert!(anime.contains("Seinen aesthetic"));

        traits.render_style = RenderStyle::Photorealistic;
        let photo = build_outfit_prompt("a red dress", &traits, "Original", false);
        assert!(photo.contains("Vogue Editorial"));
    }

    #[test]
    fn test_forced_sanitize_in_relaxed_mode() {
        let traits = relaxed();
        let elevated = build_outfit_prompt("sheer robe", &traits, "Original", false);
        assert!(elevated.contains("tulle overlay"));

        let sanitized = build_outfit_prompt("sheer robe", &traits, "Original", true);
        assert!(sanitized.contains("translucent fabric overlay"));
        assert!(!sanitized.contains("tulle overlay"));
    }

    #[test]
    fn test_consistency_clause() {
        let traits = CharacterTraits::default();
        let prompt = build_outfit_prompt("jeans", &traits, "Original", false);
        assert!(prompt.contains("Maintain facial features and hair style exactly."));

        let traits = CharacterTraits {
            hair_color: "Silver".into(),
            body_type: "Athletic".into(),
            ..Default::default()
        };
        let prompt = build_outfit_prompt("jeans", &traits, "Original", false);
        assert!(prompt.contains("Appearance: Silver hair, Original skin tone. Athletic body."));
    }

    #[test]
    fn test_empty_outfit_still_produces_prompt() {
        let prompt = build_outfit_prompt("", &CharacterTraits::default(), "Original", false);
        assert!(prompt.starts_with("Task: Change the character's outfit."));
        assert!(prompt.contains("Outfit Description: ."));
    }

    #[test]
    fn test_base_prompt_safe_mode_forces_swimsuit() {
        let traits = CharacterTraits {
            underwear_style: Some("Lace Teddy".into()),
            ..relaxed()
        };
        let normal = build_base_model_prompt(&traits, false);
        assert!(normal.contains("Attire: Wearing Black Lace Teddy."));
        assert!(normal.contains("high fashion, masterpiece"));

        let safe = build_base_model_prompt(&traits, true);
        assert!(safe.contains("Attire: Wearing Black Simple Swimsuit."));
        assert!(safe.contains("Safe for work."));
        assert!(safe.contains("modest, flat lighting"));
    }

    #[test]
    fn test_base_prompt_restrictive_mode_forces_swimsuit() {
        let traits = CharacterTraits {
            underwear_style: Some("Lace Teddy".into()),
            ..Default::default()
        };
        let prompt = build_base_model_prompt(&traits, false);
        assert!(prompt.contains("Simple Swimsuit"));
        assert!(!prompt.contains("Lace Teddy"));
    }

    #[test]
    fn test_compact_prompts() {
        let traits = CharacterTraits::default();
        let base = compact_base_prompt(&traits);
        assert!(base.starts_with("Full body character design."));
        assert!(base.contains("Physique: average bust, average waist, average hips."));
        assert!(base.contains("Simple Swimsuit"));

        let outfit = compact_outfit_prompt("a lingerie set", &traits, "Sunny Beach");
        assert_eq!(
            outfit,
            "Character wearing a detailed lace bodysuit set. Sunny Beach. High quality, detailed."
        );
        let outfit = compact_outfit_prompt("a denim jacket", &traits, "Original");
        assert_eq!(outfit, "Character wearing a denim jacket. High quality, detailed.");
    }
}
