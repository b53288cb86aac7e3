//! UI-format graph → engine job format.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

use super::{WorkflowGraph, schema};
use crate::error::GenerationError;

/// Engine-ready job: node id → operation and resolved inputs.
pub type ExecutableJob = BTreeMap<String, JobNode>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobNode {
    pub class_type: String,
    /// Named widget values and `["origin_id", slot]` link references.
    pub inputs: Map<String, Value>,
}

impl WorkflowGraph {
    /// Convert the graph into the engine's job format.
    ///
    /// Widget values are named through the schema table; link inputs become
    /// `[origin node id as string, origin slot]`. A link input wins over a
    /// widget of the same name. Unsupported node types and dangling links
    /// are errors rather than silently dropped values.
    pub fn to_job(&self) -> Result<ExecutableJob, GenerationError> {
        if let Some(node) = self
            .nodes
            .iter()
            .find(|n| schema::lookup(&n.node_type).is_none())
        {
            return Err(GenerationError::UnsupportedNode(format!(
                "{} (node {})",
                node.node_type, node.id
            )));
        }

        let validation = self.validate();
        if !validation.is_safe() {
            return Err(GenerationError::WorkflowError(
                validation.errors().collect::<Vec<_>>().join("; "),
            ));
        }

        let mut job = ExecutableJob::new();
        for node in &self.nodes {
            let Some(node_schema) = schema::lookup(&node.node_type) else {
                continue;
            };
            let mut inputs = Map::new();

            for (name, value) in node_schema.widgets.iter().zip(&node.widgets_values) {
                inputs.insert((*name).to_string(), value.clone());
            }

            for input in &node.inputs {
                let Some(link_id) = input.link else { continue };
                let link = self.link(link_id).ok_or_else(|| {
                    GenerationError::WorkflowError(format!(
                        "node {} input '{}' references missing link {}",
                        node.id, input.name, link_id
                    ))
                })?;
                let (origin, slot) = link.origin();
                inputs.insert(input.name.clone(), json!([origin.to_string(), slot]));
            }

            job.insert(
                node.id.to_string(),
                JobNode {
                    class_type: node.node_type.clone(),
                    inputs,
                },
            );
        }

        Ok(job)
    }
}
