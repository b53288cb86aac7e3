//! Node type → ordered widget parameter names.
//!
//! The engine's UI format stores parameters positionally in `widgets_values`;
//! its job format wants them by name. This table is the only place that
//! knowledge lives. Bump [`SCHEMA_VERSION`] when an entry changes order.

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeSchema {
    pub class_type: &'static str,
    /// Widget parameter names in positional order.
    pub widgets: &'static [&'static str],
}

const LATENT_SIZE: &[&str] = &["width", "height", "batch_size"];
const CLIP_LOADER: &[&str] = &["clip_name", "type"];

static SCHEMAS: &[NodeSchema] = &[
    NodeSchema {
        class_type: "KSampler",
        widgets: &[
            "seed",
            "control_after_generate",
            "steps",
            "cfg",
            "sampler_name",
            "scheduler",
            "denoise",
        ],
    },
    NodeSchema {
        class_type: "CLIPTextEncode",
        widgets: &["text"],
    },
    NodeSchema {
        class_type: "EmptySD3LatentImage",
        widgets: LATENT_SIZE,
    },
    NodeSchema {
        class_type: "EmptyLatentImage",
        widgets: LATENT_SIZE,
    },
    NodeSchema {
        class_type: "SaveImage",
        widgets: &["filename_prefix"],
    },
    NodeSchema {
        class_type: "LoadImage",
        widgets: &["image", "upload"],
    },
    NodeSchema {
        class_type: "CheckpointLoaderSimple",
        widgets: &["ckpt_name"],
    },
    NodeSchema {
        class_type: "UNETLoader",
        widgets: &["unet_name", "weight_dtype"],
    },
    NodeSchema {
        class_type: "UnetLoaderGGUF",
        widgets: &["unet_name"],
    },
    NodeSchema {
        class_type: "CLIPLoader",
        widgets: CLIP_LOADER,
    },
    NodeSchema {
        class_type: "CLIPLoaderGGUF",
        widgets: CLIP_LOADER,
    },
    NodeSchema {
        class_type: "VAELoader",
        widgets: &["vae_name"],
    },
    NodeSchema {
        class_type: "LoraLoaderModelOnly",
        widgets: &["lora_name", "strength_model"],
    },
    NodeSchema {
        class_type: "ModelSamplingAuraFlow",
        widgets: &["shift"],
    },
    NodeSchema {
        class_type: "VAEDecode",
        widgets: &[],
    },
    NodeSchema {
        class_type: "VAEEncode",
        widgets: &[],
    },
    NodeSchema {
        class_type: "ConditioningZeroOut",
        widgets: &[],
    },
];

/// Schema for a node type, or `None` when the type is not supported.
pub fn lookup(class_type: &str) -> Option<&'static NodeSchema> {
    SCHEMAS.iter().find(|s| s.class_type == class_type)
}

pub fn supported_types() -> impl Iterator<Item = &'static str> {
    SCHEMAS.iter().map(|s| s.class_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sampler_order() {
        let sampler = lookup("KSampler").unwrap();
        assert_eq!(sampler.widgets.len(), 7);
        assert_eq!(sampler.widgets[0], "seed");
        assert_eq!(sampler.widgets[6], "denoise");
    }

    #[test]
    fn test_unknown_type() {
        assert!(lookup("KSamplerAdvanced").is_none());
        assert!(lookup("ksampler").is_none());
    }

    #[test]
    fn test_types_are_unique() {
        let all: Vec<_> = supported_types().collect();
        let unique: HashSet<_> = all.iter().collect();
        assert_eq!(all.len(), unique.len());
    }
}
