//! Workflow graphs for the local execution engine.
//!
//! Templates are stored in the engine's UI format: a list of nodes whose
//! parameters sit positionally in `widgets_values`, plus a link table
//! `[id, origin_node, origin_slot, target_node, target_slot, type]`.
//! Callers overwrite a few known widget slots (prompt text, seed, input
//! image) and then convert the graph with [`WorkflowGraph::to_job`].

pub mod convert;
pub mod schema;
pub mod validation;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;

use crate::error::GenerationError;

pub use convert::{ExecutableJob, JobNode};
pub use schema::{NodeSchema, SCHEMA_VERSION};
pub use validation::{ValidationIssue, ValidationResult};

/// `CLIPTextEncode` node carrying the positive prompt.
pub const POSITIVE_PROMPT_NODE: u64 = 45;
/// `KSampler` node; widget 0 is the seed.
pub const SAMPLER_NODE: u64 = 44;
/// `LoadImage` node in the image-to-image template.
pub const LOAD_IMAGE_NODE: u64 = 100;

/// Upper bound (exclusive) for generated sampler seeds.
pub const SEED_RANGE: u64 = 1_000_000_000;

const TEXT_TO_IMAGE_JSON: &str = include_str!("../../workflows/text_to_image.json");
const IMAGE_TO_IMAGE_JSON: &str = include_str!("../../workflows/image_to_image.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowTemplate {
    TextToImage,
    ImageToImage,
}

impl WorkflowTemplate {
    pub fn file_name(self) -> &'static str {
        match self {
            WorkflowTemplate::TextToImage => "text_to_image.json",
            WorkflowTemplate::ImageToImage => "image_to_image.json",
        }
    }

    fn embedded(self) -> &'static str {
        match self {
            WorkflowTemplate::TextToImage => TEXT_TO_IMAGE_JSON,
            WorkflowTemplate::ImageToImage => IMAGE_TO_IMAGE_JSON,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowGraph {
    pub nodes: Vec<WorkflowNode>,
    #[serde(default)]
    pub links: Vec<WorkflowLink>,
    /// Layout and version metadata, kept so a graph can be written back out.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub id: u64,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub inputs: Vec<NodeInput>,
    #[serde(default)]
    pub widgets_values: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A link-carrying input slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInput {
    pub name: String,
    #[serde(default)]
    pub link: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `[id, origin_node, origin_slot, target_node, target_slot, type]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowLink(pub u64, pub u64, pub u32, pub u64, pub u32, pub Value);

impl WorkflowLink {
    pub fn id(&self) -> u64 {
        self.0
    }

    pub fn origin(&self) -> (u64, u32) {
        (self.1, self.2)
    }

    pub fn target(&self) -> (u64, u32) {
        (self.3, self.4)
    }
}

impl WorkflowGraph {
    pub fn from_json(json: &str) -> Result<Self, GenerationError> {
        serde_json::from_str(json)
            .map_err(|e| GenerationError::WorkflowError(format!("invalid workflow JSON: {}", e)))
    }

    /// Load a template, from `dir` when given, otherwise the built-in copy.
    /// Graphs that fail schema validation are rejected here, before any
    /// parameter is injected.
    pub async fn load(template: WorkflowTemplate, dir: Option<&Path>) -> Result<Self, GenerationError> {
        let graph = match dir {
            Some(dir) => {
                let path = dir.join(template.file_name());
                log::debug!("Loading workflow template from {}", path.display());
                let json = tokio::fs::read_to_string(&path).await.map_err(|e| {
                    GenerationError::WorkflowError(format!(
                        "failed to read workflow template {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Self::from_json(&json)?
            }
            None => Self::from_json(template.embedded())?,
        };

        let result = graph.validate();
        result.log_summary(template.file_name());
        if !result.is_safe() {
            return Err(GenerationError::WorkflowError(format!(
                "template {} failed validation: {}",
                template.file_name(),
                result.errors().collect::<Vec<_>>().join("; ")
            )));
        }
        Ok(graph)
    }

    pub fn node(&self, id: u64) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn link(&self, id: u64) -> Option<&WorkflowLink> {
        self.links.iter().find(|l| l.id() == id)
    }

    /// Overwrite an existing widget slot. Never adds slots and never touches
    /// inputs or links.
    pub fn set_widget(
        &mut self,
        node_id: u64,
        slot: usize,
        value: impl Into<Value>,
    ) -> Result<(), GenerationError> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.id == node_id)
            .ok_or_else(|| {
                GenerationError::WorkflowError(format!("workflow has no node {}", node_id))
            })?;
        let len = node.widgets_values.len();
        let target = node.widgets_values.get_mut(slot).ok_or_else(|| {
            GenerationError::WorkflowError(format!(
                "node {} ({}) has {} widget values, cannot set slot {}",
                node_id, node.node_type, len, slot
            ))
        })?;
        *target = value.into();
        Ok(())
    }

    /// Check every node against the schema table and every input link
    /// against the link table.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        let mut seen = HashSet::new();

        for node in &self.nodes {
            if !seen.insert(node.id) {
                result.add_error(format!("duplicate node id {}", node.id));
            }

            match schema::lookup(&node.node_type) {
                None => result.add_error(format!(
                    "node {}: unsupported node type '{}' (schema v{})",
                    node.id, node.node_type, SCHEMA_VERSION
                )),
                Some(schema) => {
                    let expected = schema.widgets.len();
                    let actual = node.widgets_values.len();
                    if actual > expected {
                        result.add_error(format!(
                            "node {} ({}): {} widget values but the schema names only {}",
                            node.id, node.node_type, actual, expected
                        ));
                    } else if actual < expected {
                        result.add_warning(format!(
                            "node {} ({}): {} of {} widget values present; missing: {}",
                            node.id,
                            node.node_type,
                            actual,
                            expected,
                            schema.widgets[actual..].join(", ")
                        ));
                    }
                }
            }

            for input in &node.inputs {
                let Some(link_id) = input.link else { continue };
                match self.link(link_id) {
                    None => result.add_error(format!(
                        "node {} input '{}' references missing link {}",
                        node.id, input.name, link_id
                    )),
                    Some(link) => {
                        let (origin, _) = link.origin();
                        if self.node(origin).is_none() {
                            result.add_error(format!(
                                "link {} starts at missing node {}",
                                link_id, origin
                            ));
                        }
                    }
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_embedded_templates_validate() {
        for template in [WorkflowTemplate::TextToImage, WorkflowTemplate::ImageToImage] {
            let graph = WorkflowGraph::load(template, None).await.unwrap();
            assert!(graph.node(POSITIVE_PROMPT_NODE).is_some());
            assert!(graph.node(SAMPLER_NODE).is_some());
            assert!(graph.validate().issues.is_empty());
        }
        let i2i = WorkflowGraph::load(WorkflowTemplate::ImageToImage, None)
            .await
            .unwrap();
        assert_eq!(i2i.node(LOAD_IMAGE_NODE).unwrap().node_type, "LoadImage");
    }

    #[tokio::test]
    async fn test_missing_template_dir() {
        let err = WorkflowGraph::load(
            WorkflowTemplate::TextToImage,
            Some(Path::new("/nonexistent/atelier/workflows")),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GenerationError::WorkflowError(_)));
    }

    #[test]
    fn test_set_widget_keeps_topology() {
        let mut graph = WorkflowGraph::from_json(TEXT_TO_IMAGE_JSON).unwrap();
        let links_before = graph.links.clone();

        graph
            .set_widget(POSITIVE_PROMPT_NODE, 0, "a \"quoted\"\nprompt")
            .unwrap();
        graph.set_widget(SAMPLER_NODE, 0, 1234).unwrap();

        assert_eq!(graph.links, links_before);
        assert_eq!(
            graph.node(POSITIVE_PROMPT_NODE).unwrap().widgets_values[0],
            json!("a \"quoted\"\nprompt")
        );
        assert_eq!(graph.node(SAMPLER_NODE).unwrap().widgets_values[0], json!(1234));
    }

    #[test]
    fn test_set_widget_rejects_new_slots() {
        let mut graph = WorkflowGraph::from_json(TEXT_TO_IMAGE_JSON).unwrap();
        assert!(graph.set_widget(POSITIVE_PROMPT_NODE, 1, "x").is_err());
        assert!(graph.set_widget(999, 0, "x").is_err());
        assert_eq!(graph.node(POSITIVE_PROMPT_NODE).unwrap().widgets_values.len(), 1);
    }

    #[test]
    fn test_validation_issues() {
        let graph = WorkflowGraph::from_json(
            &json!({
                "nodes": [
                    {"id": 1, "type": "KSampler", "widgets_values": [1, "fixed", 20, 7.0, "euler"]},
                    {"id": 2, "type": "SaveImage", "widgets_values": ["a", "b"],
                     "inputs": [{"name": "images", "type": "IMAGE", "link": 77}]},
                    {"id": 3, "type": "FancyUpscaler", "widgets_values": []}
                ],
                "links": []
            })
            .to_string(),
        )
        .unwrap();

        let result = graph.validate();
        assert!(!result.is_safe());
        assert!(result.has_warnings());
        let errors: Vec<_> = result.errors().collect();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("FancyUpscaler")));
        assert!(errors.iter().any(|e| e.contains("missing link 77")));
    }
}
