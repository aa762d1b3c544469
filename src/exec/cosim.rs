//! Cosimulation against compiled hardware.

use std::path::PathBuf;

use crate::cosim::{artifact_path, CosimBackend, StreamInterface};
use crate::error::{DwcError, Result};
use crate::node::{Direction, StreamConverterNode};
use crate::packing::{pack, unpack};
use crate::tensor::Tensor;

use super::{ExecMode, Executor};

/// Runs a converter node through a [`CosimBackend`].
pub struct CosimExecutor<B> {
    backend: B,
    fallback_dir: Option<PathBuf>,
}

impl<B: CosimBackend> CosimExecutor<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            fallback_dir: None,
        }
    }

    /// IP root used for nodes without a `code_gen_dir_ipgen` attribute.
    pub fn with_fallback_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fallback_dir = Some(dir.into());
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Where the compiled hardware for `node` should be.
    fn locate_artifact(&self, node: &StreamConverterNode) -> Result<PathBuf> {
        let root = node
            .ipgen_dir()
            .map(|p| p.to_path_buf())
            .or_else(|| self.fallback_dir.clone());
        let artifact = match root {
            Some(root) => artifact_path(&root, node.name()),
            None => {
                // Nothing has been generated for this node at all.
                return Err(DwcError::MissingArtifact {
                    path: artifact_path(&PathBuf::new(), node.name()),
                });
            }
        };
        if !artifact.is_file() {
            return Err(DwcError::MissingArtifact { path: artifact });
        }
        Ok(artifact)
    }
}

impl<B: CosimBackend> Executor for CosimExecutor<B> {
    fn mode(&self) -> ExecMode {
        ExecMode::Cosim
    }

    fn run(&mut self, node: &StreamConverterNode, input: &Tensor) -> Result<Tensor> {
        let artifact = self.locate_artifact(node)?;

        let in_width = node.in_stream_width(false);
        let out_width = node.out_stream_width(false);
        let packed = pack(input, in_width)?;
        let io = StreamInterface {
            in_width,
            out_width,
            expected_out_words: node.word_count(Direction::Output)?,
        };
        log::debug!(
            "{}: {} words of {} bits into {} backend ({})",
            node.name(),
            packed.len(),
            in_width,
            self.backend.name(),
            artifact.display()
        );

        let words = self.backend.simulate(&artifact, &packed, &io)?;
        log::debug!("{}: backend returned {} words of {} bits", node.name(), words.len(), out_width);

        unpack(&words, node.output_datatype(), out_width, node.normal_output_shape())
    }
}
