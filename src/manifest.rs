//! Node description files.
//!
//! A node description is a TOML file holding a converter's graph identity,
//! its attribute table and, optionally, a pattern for generating a test input.
//!
//! # Example
//!
//! ```toml
//! [node]
//! name = "StreamingDataWidthConverter_Batch_0"
//! domain = "finn"
//! inputs = ["act_in"]
//! outputs = ["act_out"]
//!
//! [attributes]
//! shape = [1, 4]
//! inWidth = 2
//! outWidth = 8
//! dataType = "UINT2"
//! backend = "fpgadataflow"
//!
//! [input.pattern]
//! type = "sequential"
//! start = 0
//! step = 1
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::datatype::DataType;
use crate::error::{DwcError, Result};
use crate::node::{AttributeTable, NodeSignature, StreamConverterNode};
use crate::tensor::Tensor;

/// A converter node as described on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeManifest {
    pub node: NodeSignature,
    pub attributes: AttributeTable,
    #[serde(default)]
    pub input: Option<InputDef>,
}

/// Test input definition.
#[derive(Debug, Clone, Deserialize)]
pub struct InputDef {
    pub pattern: PatternDef,
}

/// Pattern for generating input data.
#[derive(Debug, Clone, Deserialize)]
pub struct PatternDef {
    #[serde(rename = "type")]
    pub pattern_type: String,
    #[serde(default)]
    pub start: i64,
    #[serde(default = "default_step")]
    pub step: i64,
    #[serde(default)]
    pub value: i64,
}

fn default_step() -> i64 {
    1
}

impl NodeManifest {
    /// Load a manifest from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DwcError::config(format!("failed to read node description {}: {}", path.display(), e))
        })?;
        Self::parse(&content).map_err(|e| DwcError::config(format!("{}: {}", path.display(), e)))
    }

    /// Parse a manifest from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| DwcError::config(format!("invalid node description: {}", e)))
    }

    /// Build the converter node this manifest describes.
    pub fn build_node(&self) -> Result<StreamConverterNode> {
        StreamConverterNode::from_table(self.node.clone(), &self.attributes)
            .map_err(|e| DwcError::config(format!("{}: {}", self.node.name, e)))
    }

    /// Generate the input tensor for `node`, if the manifest defines a pattern.
    pub fn generate_input(&self, node: &StreamConverterNode) -> Result<Option<Tensor>> {
        let Some(input) = &self.input else {
            return Ok(None);
        };
        let shape = node.normal_input_shape().clone();
        let dt = node.input_datatype();
        let count = shape.elem_count();
        let pattern = &input.pattern;

        let data: Vec<f32> = match pattern.pattern_type.as_str() {
            "sequential" => (0..count)
                .map(|i| wrap_into(dt, pattern.start + i as i64 * pattern.step))
                .collect(),
            "constant" => {
                let v = pattern.value as f32;
                if !dt.allowed(v) {
                    return Err(DwcError::validation(format!(
                        "constant {} is not a valid {}",
                        pattern.value, dt
                    )));
                }
                vec![v; count]
            }
            "alternating" => {
                let (lo, hi) = alternating_pair(dt);
                (0..count).map(|i| if i % 2 == 0 { lo } else { hi }).collect()
            }
            other => {
                return Err(DwcError::config(format!("unknown input pattern {:?}", other)));
            }
        };

        Ok(Some(Tensor::new(shape, data, dt)?))
    }
}

/// Wrap an integer into the representable range of `dt`.
fn wrap_into(dt: DataType, value: i64) -> f32 {
    match dt {
        DataType::Float32 => value as f32,
        DataType::Bipolar => {
            if value.rem_euclid(2) == 0 {
                -1.0
            } else {
                1.0
            }
        }
        _ => {
            let min = dt.min() as i64;
            let span = dt.max() as i64 - min + 1;
            (min + (value - min).rem_euclid(span)) as f32
        }
    }
}

fn alternating_pair(dt: DataType) -> (f32, f32) {
    match dt {
        DataType::Float32 => (-1.0, 1.0),
        _ => (dt.min() as f32, dt.max() as f32),
    }
}
