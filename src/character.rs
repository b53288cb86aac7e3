//! Character state handed in by the UI for each generation call.

use serde::{Deserialize, Serialize};

use crate::image::EncodedImage;

/// Sentinel used by the trait pickers and the scene selector for "leave as is".
pub const ORIGINAL: &str = "Original";

pub const SCENES: &[&str] = &[
    "Original",
    "White Studio",
    "Luxury Apartment",
    "Cyberpunk City",
    "Enchanted Forest",
    "Sunny Beach",
    "Space Station",
    "Victorian Street",
];

pub const HAIR_COLORS: &[&str] = &[
    "Original", "Blonde", "Black", "Brown", "Red", "Pink", "Blue", "White", "Silver", "Purple",
    "Green",
];

pub const SKIN_TONES: &[&str] = &[
    "Original", "Pale", "Fair", "Medium", "Tan", "Dark", "Deep", "Ebony",
];

pub const BODY_TYPES: &[&str] = &[
    "Original", "Slender", "Athletic", "Curvy", "Muscular", "Chubby",
];

pub const BACKGROUND_COLORS: &[&str] = &[
    "White",
    "Light Grey",
    "Dark Grey",
    "Black",
    "Green Screen",
    "Blue Screen",
    "Soft Pink",
    "Beige",
];

pub const UNDERWEAR_COLORS: &[&str] = &["Black", "White", "Red", "Blue", "Pink", "Beige", "Grey"];

pub const UNDERWEAR_STYLES: &[&str] = &[
    "Classic Set",
    "Thong & Bralette",
    "Boy Shorts",
    "Sporty Briefs",
    "Lace Teddy",
    "High-Waisted",
];

pub const POSES: &[&str] = &[
    "A-Pose",
    "Standing (Neutral)",
    "Model Stance (Hand on Hip)",
    "Fashion Walk",
    "Over Shoulder Look",
    "Leaning Against Wall",
    "Action (Running)",
    "Action (Jumping)",
    "Combat Stance",
    "Floating / Levitation",
    "Heroic Stance (Low Angle)",
    "Looking Back (Cinematic)",
    "Windy (Hair Flowing)",
    "Sitting (Chair)",
    "Sitting (Floor)",
    "Kneeling",
    "Reclining (Chaise)",
    "Curled Up",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenderStyle {
    #[default]
    Anime,
    Photorealistic,
}

/// Stable appearance of the character. Serialises with the UI's camelCase
/// field names so a saved snapshot deserialises as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterTraits {
    pub hair_color: String,
    pub skin_tone: String,
    pub body_type: String,
    pub background_color: String,
    /// 0-100 slider.
    pub chest_size: u8,
    /// 0-100 slider.
    pub waist_size: u8,
    /// 0-100 slider.
    pub hip_size: u8,
    pub underwear_color: String,
    #[serde(default)]
    pub underwear_style: Option<String>,
    pub pose: String,
    /// Relaxed content mode when true, restrictive otherwise.
    pub nsfw: bool,
    pub render_style: RenderStyle,
}

impl Default for CharacterTraits {
    fn default() -> Self {
        Self {
            hair_color: ORIGINAL.to_string(),
            skin_tone: ORIGINAL.to_string(),
            body_type: ORIGINAL.to_string(),
            background_color: "White".to_string(),
            chest_size: 50,
            waist_size: 50,
            hip_size: 50,
            underwear_color: "Black".to_string(),
            underwear_style: Some("Classic Set".to_string()),
            pose: "A-Pose".to_string(),
            nsfw: false,
            render_style: RenderStyle::Anime,
        }
    }
}

impl CharacterTraits {
    pub fn is_relaxed(&self) -> bool {
        self.nsfw
    }

    pub fn is_restrictive(&self) -> bool {
        !self.nsfw
    }

    /// True when hair and skin are both left at the "Original" sentinel.
    pub fn keeps_original_look(&self) -> bool {
        self.hair_color == ORIGINAL && self.skin_tone == ORIGINAL
    }
}

/// One outfit-change call. Built fresh per call and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub source_image: EncodedImage,
    pub outfit: String,
    pub traits: CharacterTraits,
    pub scene: String,
}

impl GenerationRequest {
    pub fn new(
        source_image: EncodedImage,
        outfit: impl Into<String>,
        traits: CharacterTraits,
    ) -> Self {
        Self {
            source_image,
            outfit: outfit.into(),
            traits,
            scene: ORIGINAL.to_string(),
        }
    }

    pub fn with_scene(mut self, scene: impl Into<String>) -> Self {
        self.scene = scene.into();
        self
    }
}

/// A base-character (underwear/full body) generation call.
#[derive(Debug, Clone)]
pub struct BaseModelRequest {
    /// Reference image. The local pipeline generates from text only and
    /// ignores it.
    pub source_image: EncodedImage,
    pub traits: CharacterTraits,
}

impl BaseModelRequest {
    pub fn new(source_image: EncodedImage, traits: CharacterTraits) -> Self {
        Self {
            source_image,
            traits,
        }
    }
}
