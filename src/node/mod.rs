//! The width converter node.
//!
//! - [`attributes`]: attribute table and the validated record built from it
//! - [`converter`]: the node itself and its shape/width queries
//! - [`validate`]: structural diagnostics
//! - [`codegen`]: HLS template fragments

pub mod attributes;
pub mod codegen;
pub mod converter;
pub mod validate;

pub use attributes::{AttrValue, AttributeTable, NodeAttributes};
pub use codegen::CodeGenDict;
pub use converter::{Direction, NodeSignature, StreamConverterNode, OP_TYPE};
pub use validate::verify_node;
