//! Slider-to-word mapping for body proportions. Every prompt, and any UI label
//! for the same slider, goes through [`body_part_descriptor`].

use crate::character::CharacterTraits;

/// Map a 0-100 slider onto one of five fixed buckets.
pub fn body_part_descriptor(value: u8) -> &'static str {
    match value {
        0..=29 => "slender",
        30..=49 => "toned",
        50..=69 => "average",
        70..=89 => "curvy",
        _ => "voluptuous",
    }
}

/// Descriptors for the three proportion sliders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Physique {
    pub bust: &'static str,
    pub waist: &'static str,
    pub hips: &'static str,
}

impl Physique {
    pub fn of(traits: &CharacterTraits) -> Self {
        Self {
            bust: body_part_descriptor(traits.chest_size),
            waist: body_part_descriptor(traits.waist_size),
            hips: body_part_descriptor(traits.hip_size),
        }
    }

    /// `"<bust> bust, <waist> waist, <hips> hips"`
    pub fn clause(&self) -> String {
        format!("{} bust, {} waist, {} hips", self.bust, self.waist, self.hips)
    }
}
