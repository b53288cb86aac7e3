//! Lexical rewriting of outfit descriptions.
//!
//! Two ordered rule tables: the sanitizing table swaps explicit or risqué
//! terms for policy-safe euphemisms that keep the visual intent, the elevating
//! table reframes them in high-fashion and fine-art vocabulary. Rules run
//! highest priority first, then longest trigger first, so specific phrases
//! ("cage bra", "wet look") are consumed before their generic parts.
//! Every trigger is anchored on word boundaries.

use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};

/// One substitution rule. `pattern` is a regex matched case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteRule {
    pub pattern: &'static str,
    pub replacement: &'static str,
    pub priority: u8,
}

const fn rule(pattern: &'static str, replacement: &'static str, priority: u8) -> RewriteRule {
    RewriteRule {
        pattern,
        replacement,
        priority,
    }
}

const SANITIZING: &[RewriteRule] = &[
    // presets
    rule(
        r"\b(?:micro-string|micro string|string set)\b",
        "minimalist strap design",
        3,
    ),
    rule(r"\b(?:cage bra|strappy)\b", "geometric harness detail", 3),
    rule(
        r"\b(?:risqu[eé]|open-silhouette|ouvert)\b",
        "cutout silhouette",
        3,
    ),
    rule(r"\b(?:shibari|ropes?)\b", "decorative cord detailing", 3),
    // lingerie
    rule(r"\blingerie\b", "detailed lace bodysuit", 2),
    rule(r"\bbikinis?\b", "two-piece resort wear", 2),
    rule(r"\bthongs?\b", "high-cut bottom", 2),
    rule(r"\b(?:panty|panties|underwear)\b", "matching bottom piece", 2),
    rule(r"\b(?:bras?|bralettes?)\b", "structured top piece", 2),
    // textures
    rule(
        r"\b(?:sheer|see-through|transparent)\b",
        "translucent fabric overlay",
        2,
    ),
    rule(r"\b(?:wet|soaked)\b", "damp aesthetic", 2),
    // vibe
    rule(
        r"\b(?:boudoir|sensual|sexy|glamour|nude|naked|provocative|nudity)\b",
        "high-fashion editorial",
        1,
    ),
    rule(r"\bfetish\b", "edgy aesthetic", 1),
    rule(r"\b(?:latex|vinyl|pvc)\b", "glossy material", 1),
    rule(r"\b(?:oil|oiled|oily)\b", "shimmering skin", 1),
    rule(r"\bmicro\b", "minimalist", 1),
    // anatomy
    rule(r"\b(?:breasts?|chest|boobs)\b", "upper body silhouette", 1),
    rule(r"\b(?:hips?|butt|legs)\b", "lower body silhouette", 1),
    rule(r"\b(?:petite|flat|voluptuous|huge|tiny)\b", "refined", 1),
];

const ELEVATING: &[RewriteRule] = &[
    rule(
        r"\b(?:naked|nude|unclothed)\b",
        "artistic figure study, skin-focused, body art",
        3,
    ),
    rule(
        r"\b(?:nipples?|areolas?)\b",
        "highly detailed anatomy, hyper-realistic",
        3,
    ),
    rule(
        r"\b(?:genitals?|vagina|pussy|penis)\b",
        "anatomically correct form",
        3,
    ),
    rule(r"\b(?:sex|fucking)\b", "intimate connection", 3),
    rule(
        r"\b(?:wet t-shirt|wet look)\b",
        "translucent wet fabric effect, clinging texture, water droplets on skin",
        3,
    ),
    rule(
        r"\b(?:slutty|whore)\b",
        "bold and confident statement piece",
        2,
    ),
    rule(r"\bstrippers?\b", "burlesque couture aesthetic", 2),
    rule(r"\bfetish\b", "avant-garde conceptual fashion", 2),
    rule(
        r"\b(?:bondage|ropes?)\b",
        "intricate shibari-inspired structural ropes",
        2,
    ),
    rule(
        r"\bporn(?:o|ographic)?\b",
        "cinematic glamour photography",
        2,
    ),
    rule(
        r"\b(?:oil|oiled)\b",
        "high-gloss skin texture, shimmering body oil",
        1,
    ),
    rule(r"\bmicro\b", "minimalist ultra-cropped", 1),
    rule(
        r"\b(?:sheer|see-through|transparent)\b",
        "translucent sheer fabric, layered opacity, tulle overlay",
        1,
    ),
];

/// Which rewrite was applied to an outfit description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptVariant {
    Elevated,
    Sanitized,
}

impl PromptVariant {
    /// Restrictive content mode, or a forced safety retry, always sanitizes.
    pub fn select(relaxed: bool, force_sanitized: bool) -> Self {
        if !relaxed || force_sanitized {
            PromptVariant::Sanitized
        } else {
            PromptVariant::Elevated
        }
    }

    pub fn apply(self, text: &str) -> String {
        match self {
            PromptVariant::Sanitized => sanitize(text),
            PromptVariant::Elevated => elevate(text),
        }
    }
}

struct CompiledRule {
    regex: Regex,
    replacement: &'static str,
}

fn compile(table: &[RewriteRule]) -> Vec<CompiledRule> {
    let mut ordered = table.to_vec();
    ordered.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(b.pattern.len().cmp(&a.pattern.len()))
    });
    ordered
        .into_iter()
        .filter_map(|r| match Regex::new(&format!("(?i){}", r.pattern)) {
            Ok(regex) => Some(CompiledRule {
                regex,
                replacement: r.replacement,
            }),
            Err(e) => {
                log::error!("Skipping invalid rewrite pattern {:?}: {}", r.pattern, e);
                None
            }
        })
        .collect()
}

static SANITIZING_COMPILED: Lazy<Vec<CompiledRule>> = Lazy::new(|| compile(SANITIZING));
static ELEVATING_COMPILED: Lazy<Vec<CompiledRule>> = Lazy::new(|| compile(ELEVATING));

fn apply_rules(rules: &[CompiledRule], text: &str) -> String {
    rules.iter().fold(text.to_string(), |acc, r| {
        r.regex.replace_all(&acc, NoExpand(r.replacement)).into_owned()
    })
}

/// The sanitizing table, in declaration order.
pub fn sanitizing_rules() -> &'static [RewriteRule] {
    SANITIZING
}

/// The elevating table, in declaration order.
pub fn elevating_rules() -> &'static [RewriteRule] {
    ELEVATING
}

pub fn sanitize(text: &str) -> String {
    apply_rules(&SANITIZING_COMPILED, text)
}

pub fn elevate(text: &str) -> String {
    apply_rules(&ELEVATING_COMPILED, text)
}
