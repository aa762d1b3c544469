//! In-process model of the streaming data-width converter block.
//!
//! The hardware treats the input as one continuous bit stream: a wide input
//! word is emitted as several narrow words, least significant slice first,
//! and narrow input words are accumulated into a wide one with the first word
//! in the least significant bits. Both cases reduce to re-chunking the
//! concatenated bit stream, which is what this model does.
//!
//! The block moves one word per cycle on its busier side, so a run takes
//! `max(in_words, out_words)` cycles.

use std::path::Path;

use crate::packing::StreamWord;

use super::{CosimBackend, CosimError, StreamInterface};

/// Statistics from the most recent simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub in_words: usize,
    pub out_words: usize,
    pub cycles: u64,
}

/// Bit-level behavioural model of the width converter.
#[derive(Debug, Default)]
pub struct BehaviouralBackend {
    last_run: Option<RunStats>,
}

impl BehaviouralBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statistics of the last successful run.
    pub fn last_run(&self) -> Option<RunStats> {
        self.last_run
    }
}

impl CosimBackend for BehaviouralBackend {
    fn name(&self) -> &str {
        "behavioural"
    }

    fn simulate(
        &mut self,
        artifact: &Path,
        input: &[StreamWord],
        io: &StreamInterface,
    ) -> Result<Vec<StreamWord>, CosimError> {
        if !artifact.is_file() {
            return Err(CosimError::ArtifactMissing(artifact.to_path_buf()));
        }
        if io.in_width == 0 || io.out_width == 0 {
            return Err(CosimError::Failed("zero-width stream interface".to_string()));
        }
        if let Some(w) = input.iter().find(|w| w.width() != io.in_width) {
            return Err(CosimError::Failed(format!(
                "{}-bit word driven onto {}-bit input",
                w.width(),
                io.in_width
            )));
        }

        let total_bits = input.len() as u64 * io.in_width as u64;
        if total_bits % io.out_width as u64 != 0 {
            return Err(CosimError::Failed(format!(
                "input stream of {} bits ends inside a {}-bit output word",
                total_bits, io.out_width
            )));
        }

        let out_count = (total_bits / io.out_width as u64) as usize;
        let mut output = Vec::with_capacity(out_count);
        let mut current = StreamWord::zeroed(io.out_width);
        let mut fill = 0u32;

        for word in input {
            for bit in 0..io.in_width {
                current.set_bit(fill, word.bit(bit));
                fill += 1;
                if fill == io.out_width {
                    output.push(std::mem::replace(&mut current, StreamWord::zeroed(io.out_width)));
                    fill = 0;
                }
            }
        }

        if output.len() != io.expected_out_words {
            log::warn!(
                "behavioural model produced {} words, caller expects {}",
                output.len(),
                io.expected_out_words
            );
        }

        let stats = RunStats {
            in_words: input.len(),
            out_words: output.len(),
            cycles: input.len().max(output.len()) as u64,
        };
        log::debug!(
            "behavioural DWC {} -> {} bits: {} words in, {} words out, {} cycles",
            io.in_width,
            io.out_width,
            stats.in_words,
            stats.out_words,
            stats.cycles
        );
        self.last_run = Some(stats);
        Ok(output)
    }
}
