//! External simulator driven as a child process.
//!
//! Input words are written one hex word per line to a staging file private to
//! the call; the simulator is invoked as
//!
//! ```text
//! <program> [args...] --top <artifact> --in <in.hex> --out <out.hex> \
//!     --in-width <bits> --out-width <bits> --words <expected out words>
//! ```
//!
//! and is expected to write its output words, one hex word per line, to the
//! `--out` file. Exit status 66 (`EX_NOINPUT`) means the simulator could not
//! find or load the artifact.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::packing::StreamWord;

use super::{CosimBackend, CosimError, StreamInterface};

/// Exit status a simulator uses to report an unusable artifact.
pub const EXIT_NO_INPUT: i32 = 66;

static STAGE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Runs an external simulator executable.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    program: PathBuf,
    args: Vec<String>,
    stage_root: PathBuf,
}

impl CommandBackend {
    /// Backend that runs `program`, staging files under the system temp dir.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stage_root: std::env::temp_dir(),
        }
    }

    /// Arguments passed before the standard ones.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Directory under which per-call staging directories are created.
    pub fn with_stage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.stage_root = root.into();
        self
    }

    fn stage_dir(&self) -> PathBuf {
        let n = STAGE_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.stage_root
            .join(format!("dwc_cosim_{}_{}", std::process::id(), n))
    }

    fn run_in(
        &self,
        stage: &Path,
        artifact: &Path,
        input: &[StreamWord],
        io: &StreamInterface,
    ) -> Result<Vec<StreamWord>, CosimError> {
        let in_file = stage.join("input.hex");
        let out_file = stage.join("output.hex");

        let mut text = String::with_capacity(input.len() * (io.in_width as usize / 4 + 4));
        for word in input {
            text.push_str(&word.to_hex());
            text.push('\n');
        }
        std::fs::write(&in_file, text)?;

        log::debug!(
            "running {} for {} ({} input words)",
            self.program.display(),
            artifact.display(),
            input.len()
        );
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg("--top")
            .arg(artifact)
            .arg("--in")
            .arg(&in_file)
            .arg("--out")
            .arg(&out_file)
            .arg("--in-width")
            .arg(io.in_width.to_string())
            .arg("--out-width")
            .arg(io.out_width.to_string())
            .arg("--words")
            .arg(io.expected_out_words.to_string())
            .output()?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            log::warn!("{}: {}", self.program.display(), stderr.trim());
        }

        match output.status.code() {
            Some(0) => {}
            Some(EXIT_NO_INPUT) => return Err(CosimError::ArtifactMissing(artifact.to_path_buf())),
            code => {
                return Err(CosimError::Failed(format!(
                    "{} exited with {}: {}",
                    self.program.display(),
                    code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
                    stderr.trim()
                )))
            }
        }

        let content = std::fs::read_to_string(&out_file)?;
        content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .enumerate()
            .map(|(i, line)| {
                StreamWord::from_hex(line, io.out_width).ok_or_else(|| {
                    CosimError::Failed(format!(
                        "output line {} is not a {}-bit hex word: {:?}",
                        i + 1,
                        io.out_width,
                        line
                    ))
                })
            })
            .collect()
    }
}

impl CosimBackend for CommandBackend {
    fn name(&self) -> &str {
        "command"
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

        let stage = self.stage_dir();
        std::fs::create_dir_all(&stage)?;
        let result = self.run_in(&stage, artifact, input, io);
        if let Err(e) = std::fs::remove_dir_all(&stage) {
            log::warn!("failed to clean up {}: {}", stage.display(), e);
        }
        result
    }
}
