//! Cosimulation backends.
//!
//! A backend runs packed stream words through a compiled hardware artifact
//! and returns the words that come out the other side. The converter does not
//! care how: an external RTL simulator, or an in-process model of the block.
//!
//! # Backends
//!
//! - [`CommandBackend`]: drives an external simulator executable, exchanging
//!   words as hex text files
//! - [`BehaviouralBackend`]: in-process bit-level model of the width converter
//!
//! # Artifact Layout
//!
//! Generated IP for a node named `N` is expected at
//!
//! ```text
//! <code_gen_dir_ipgen>/project_N/sol1/impl/verilog/N_N.v
//! ```

mod behavioural;
mod command;

pub use behavioural::{BehaviouralBackend, RunStats};
pub use command::CommandBackend;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::error::DwcError;
use crate::packing::StreamWord;

/// Interface widths and sizes for one simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInterface {
    /// Bits per input transfer.
    pub in_width: u32,
    /// Bits per output transfer.
    pub out_width: u32,
    /// Output transfers the caller expects to collect.
    pub expected_out_words: usize,
}

/// Errors a backend can report.
#[derive(Debug, Error)]
pub enum CosimError {
    /// The compiled hardware artifact does not exist.
    #[error("hardware artifact not found: {}", .0.display())]
    ArtifactMissing(PathBuf),

    /// The simulation ran but did not produce usable output.
    #[error("simulation failed: {0}")]
    Failed(String),

    #[error("simulator I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CosimError> for DwcError {
    fn from(err: CosimError) -> Self {
        match err {
            CosimError::ArtifactMissing(path) => DwcError::MissingArtifact { path },
            other => DwcError::Backend(other.to_string()),
        }
    }
}

/// Something that can run packed streams against compiled hardware.
pub trait CosimBackend {
    /// Short name for log messages.
    fn name(&self) -> &str;

    /// Feed `input` through the hardware at `artifact` and collect its output.
    ///
    /// Blocks until the simulation finishes. Implementations must report a
    /// missing artifact as [`CosimError::ArtifactMissing`].
    fn simulate(
        &mut self,
        artifact: &Path,
        input: &[StreamWord],
        io: &StreamInterface,
    ) -> Result<Vec<StreamWord>, CosimError>;
}

impl<B: CosimBackend + ?Sized> CosimBackend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn simulate(
        &mut self,
        artifact: &Path,
        input: &[StreamWord],
        io: &StreamInterface,
    ) -> Result<Vec<StreamWord>, CosimError> {
        (**self).simulate(artifact, input, io)
    }
}

/// Location of the generated top-level HDL for `node_name`.
pub fn artifact_path(ipgen_dir: &Path, node_name: &str) -> PathBuf {
    ipgen_dir
        .join(format!("project_{}", node_name))
        .join("sol1")
        .join("impl")
        .join("verilog")
        .join(format!("{}_{}.v", node_name, node_name))
}
