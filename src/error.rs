//! Error taxonomy for the width converter.
//!
//! Every error aborts the current call. Nothing here is retried; rebuilding a
//! missing hardware artifact and trying again is left to whoever drives the
//! pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::datatype::DataType;
use crate::shape::Shape;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DwcError>;

/// Errors raised by the converter node and its execution engine.
#[derive(Debug, Error)]
pub enum DwcError {
    /// Illegal width/shape relation or malformed attribute table.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// `execute()` was handed an input that does not match the node.
    #[error("validation error: {0}")]
    Validation(String),

    /// Cosimulation requested but the compiled hardware is not on disk.
    #[error("missing hardware artifact: {} (was the IP generation step run?)", .path.display())]
    MissingArtifact {
        /// Location the artifact was expected at.
        path: PathBuf,
    },

    /// Output failed its shape/datatype postcondition. Always an internal bug.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Simulator failed for a reason other than a missing artifact.
    #[error("cosimulation backend failed: {0}")]
    Backend(String),
}

impl DwcError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        DwcError::Configuration(msg.into())
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        DwcError::Validation(msg.into())
    }

    /// Build a shape postcondition failure from the two shapes involved.
    pub(crate) fn shape_mismatch(expected: &Shape, got: &Shape) -> Self {
        DwcError::ShapeMismatch(format!("expected {}, got {}", expected, got))
    }

    /// Build a datatype postcondition failure.
    pub(crate) fn datatype_mismatch(expected: DataType, got: DataType) -> Self {
        DwcError::ShapeMismatch(format!("expected datatype {}, got {}", expected, got))
    }

    /// True for the configuration variant.
    pub fn is_configuration(&self) -> bool {
        matches!(self, DwcError::Configuration(_))
    }

    /// True for the validation variant.
    pub fn is_validation(&self) -> bool {
        matches!(self, DwcError::Validation(_))
    }

    /// True when a compiled artifact was absent.
    pub fn is_missing_artifact(&self) -> bool {
        matches!(self, DwcError::MissingArtifact { .. })
    }

    /// True for the output postcondition variant.
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(self, DwcError::ShapeMismatch(_))
    }
}
