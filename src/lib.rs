//! dwc-bridge library
//!
//! Streaming data-width converter for dataflow hardware pipelines: the
//! folding algebra relating a logical tensor to its packed stream forms, and
//! functional or cosimulated execution of the converter node.

pub mod config;
pub mod cosim;
pub mod datatype;
pub mod error;
pub mod exec;
pub mod folding;
pub mod manifest;
pub mod node;
pub mod packing;
pub mod shape;
pub mod tensor;

pub use datatype::DataType;
pub use error::{DwcError, Result};
pub use exec::{ExecMode, ExecutionEngine};
pub use node::{Direction, NodeAttributes, NodeSignature, StreamConverterNode};
pub use shape::Shape;
pub use tensor::{ExecutionContext, Tensor};
