//! The streaming data-width converter node.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::datatype::DataType;
use crate::error::{DwcError, Result};
use crate::folding::{compute_folded_shape, roundup_to_multiple, validate_width_relation};
use crate::shape::Shape;

use super::attributes::{AttributeTable, NodeAttributes};

/// Operator type name of the converter in a dataflow graph.
pub const OP_TYPE: &str = "StreamingDataWidthConverter_Batch";

/// Graph-level identity of a node: its name, domain and tensor connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSignature {
    pub name: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl NodeSignature {
    /// Single-input, single-output signature in the `finn` domain.
    pub fn new(name: impl Into<String>, input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: "finn".to_string(),
            inputs: vec![input.into()],
            outputs: vec![output.into()],
        }
    }
}

/// Which side of the converter a query refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// A width converter between two streams carrying the same logical tensor.
///
/// Configuration is validated at construction and never changes afterwards.
#[derive(Debug, Clone)]
pub struct StreamConverterNode {
    signature: NodeSignature,
    attrs: NodeAttributes,
}

impl StreamConverterNode {
    /// Build a node from validated attributes, checking the width invariants.
    pub fn new(signature: NodeSignature, attrs: NodeAttributes) -> Result<Self> {
        attrs.datatype.check_supported()?;
        if attrs.shape.checked_elem_count().is_none() {
            return Err(DwcError::config(format!(
                "shape {} has more elements than fit in usize",
                attrs.shape
            )));
        }
        for (label, width) in [("inWidth", attrs.in_width), ("outWidth", attrs.out_width)] {
            if roundup_to_multiple(width, 8).is_none() {
                return Err(DwcError::config(format!(
                    "{} {} cannot be padded to a whole number of bytes",
                    label, width
                )));
            }
        }

        let node = Self { signature, attrs };
        // Surface every configuration error now rather than on first query.
        let fin = node.folded_input_shape()?;
        let fout = node.folded_output_shape()?;
        log::debug!(
            "{}: {} -> {} bits, folded in {} / out {}",
            node.name(),
            node.attrs.in_width,
            node.attrs.out_width,
            fin,
            fout
        );
        Ok(node)
    }

    /// Build a node straight from the compiler's attribute table.
    pub fn from_table(signature: NodeSignature, table: &AttributeTable) -> Result<Self> {
        let attrs = NodeAttributes::from_table(table)?;
        Self::new(signature, attrs)
    }

    pub fn signature(&self) -> &NodeSignature {
        &self.signature
    }

    pub fn attributes(&self) -> &NodeAttributes {
        &self.attrs
    }

    pub fn name(&self) -> &str {
        &self.signature.name
    }

    /// The single declared input tensor name.
    pub fn input_name(&self) -> Result<&str> {
        match self.signature.inputs.as_slice() {
            [name] => Ok(name),
            other => Err(DwcError::validation(format!(
                "{} needs exactly 1 data input, has {}",
                self.name(),
                other.len()
            ))),
        }
    }

    /// The single declared output tensor name.
    pub fn output_name(&self) -> Result<&str> {
        match self.signature.outputs.as_slice() {
            [name] => Ok(name),
            other => Err(DwcError::validation(format!(
                "{} needs exactly 1 output, has {}",
                self.name(),
                other.len()
            ))),
        }
    }

    pub fn input_datatype(&self) -> DataType {
        self.attrs.datatype
    }

    pub fn output_datatype(&self) -> DataType {
        self.attrs.datatype
    }

    pub fn normal_input_shape(&self) -> &Shape {
        &self.attrs.shape
    }

    pub fn normal_output_shape(&self) -> &Shape {
        &self.attrs.shape
    }

    /// Input shape folded to `in_width` transfers.
    pub fn folded_input_shape(&self) -> Result<Shape> {
        validate_width_relation(self.attrs.in_width, self.attrs.out_width)?;
        compute_folded_shape(
            self.normal_input_shape(),
            self.attrs.in_width,
            self.input_datatype().storage_bits(),
        )
    }

    /// Output shape folded to `out_width` transfers.
    pub fn folded_output_shape(&self) -> Result<Shape> {
        validate_width_relation(self.attrs.in_width, self.attrs.out_width)?;
        compute_folded_shape(
            self.normal_output_shape(),
            self.attrs.out_width,
            self.output_datatype().storage_bits(),
        )
    }

    /// Folded shape on one side of the converter.
    pub fn folded_shape(&self, direction: Direction) -> Result<Shape> {
        match direction {
            Direction::Input => self.folded_input_shape(),
            Direction::Output => self.folded_output_shape(),
        }
    }

    /// Input stream width, optionally padded to a whole number of bytes.
    pub fn in_stream_width(&self, pad_to_byte: bool) -> u32 {
        pad_width(self.attrs.in_width, pad_to_byte)
    }

    /// Output stream width, optionally padded to a whole number of bytes.
    pub fn out_stream_width(&self, pad_to_byte: bool) -> u32 {
        pad_width(self.attrs.out_width, pad_to_byte)
    }

    /// Stream width on one side of the converter.
    pub fn stream_width(&self, direction: Direction, pad_to_byte: bool) -> u32 {
        match direction {
            Direction::Input => self.in_stream_width(pad_to_byte),
            Direction::Output => self.out_stream_width(pad_to_byte),
        }
    }

    /// Number of stream transfers needed to move one tensor in `direction`.
    pub fn word_count(&self, direction: Direction) -> Result<usize> {
        Ok(self.folded_shape(direction)?.outer_count())
    }

    /// Input words packed into one output word (1 when narrowing).
    pub fn num_in_words(&self) -> u32 {
        if self.attrs.out_width > self.attrs.in_width {
            self.attrs.out_width / self.attrs.in_width
        } else {
            1
        }
    }

    /// Check the graph's recorded input shape against the node configuration.
    pub fn check_input_shape(&self, model_shape: &Shape) -> Result<()> {
        if model_shape != self.normal_input_shape() {
            return Err(DwcError::validation(format!(
                "unexpected input shape for {}: graph has {}, node expects {}",
                self.name(),
                model_shape,
                self.normal_input_shape()
            )));
        }
        Ok(())
    }

    /// Output datatype given the input's: a width converter never changes it.
    pub fn infer_output_datatype(&self, input: DataType) -> DataType {
        input
    }

    /// Directory holding generated IP, if configured.
    pub fn ipgen_dir(&self) -> Option<&Path> {
        self.attrs.code_gen_dir_ipgen.as_deref()
    }

    /// Directory holding functional-run code, if configured.
    pub fn npysim_dir(&self) -> Option<&Path> {
        self.attrs.code_gen_dir_npysim.as_deref()
    }
}

fn pad_width(width: u32, pad_to_byte: bool) -> u32 {
    if pad_to_byte {
        // Widths that cannot be padded are rejected in `new`.
        roundup_to_multiple(width, 8).unwrap_or(width)
    } else {
        width
    }
}
