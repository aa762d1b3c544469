//! Execution engine for the width converter.
//!
//! A node can be evaluated two ways, chosen per call:
//!
//! - **Functional** ([`FunctionalExecutor`]): the logical reference. Width
//!   conversion never changes values, so this checks that the input folds
//!   legally and hands the same values back.
//! - **Cosimulation** ([`CosimExecutor`]): packs the input into `in_width`
//!   words, runs them through compiled hardware via a [`CosimBackend`] and
//!   unpacks the `out_width` words that come back.
//!
//! Both modes validate the input on entry and check the output shape and
//! datatype on exit. Output is written to the context only on success; no
//! state survives between calls.
//!
//! # Example
//!
//! ```ignore
//! use dwc_bridge::exec::{ExecMode, ExecutionEngine};
//! use dwc_bridge::cosim::BehaviouralBackend;
//!
//! let mut engine = ExecutionEngine::new(BehaviouralBackend::new());
//! engine.execute(&node, &mut context, ExecMode::Functional)?;
//! ```

mod cosim;
mod functional;

pub use cosim::CosimExecutor;
pub use functional::FunctionalExecutor;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::Config;
use crate::cosim::CosimBackend;
use crate::error::{DwcError, Result};
use crate::node::StreamConverterNode;
use crate::tensor::{ExecutionContext, Tensor};

/// How a node is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExecMode {
    /// Logical reference evaluation.
    #[default]
    Functional,
    /// Bit-accurate run against compiled hardware.
    Cosim,
}

impl ExecMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecMode::Functional => "functional",
            ExecMode::Cosim => "cosim",
        }
    }
}

impl fmt::Display for ExecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecMode {
    type Err = DwcError;

    /// Accepts `functional`/`npysim` and `cosim`/`rtlsim`.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "functional" | "npysim" => Ok(ExecMode::Functional),
            "cosim" | "rtlsim" => Ok(ExecMode::Cosim),
            other => Err(DwcError::validation(format!(
                "invalid exec_mode {:?}; expected one of \"npysim\", \"rtlsim\", \"functional\", \"cosim\"",
                other
            ))),
        }
    }
}

/// One way of evaluating a converter node on a validated input.
pub trait Executor {
    fn mode(&self) -> ExecMode;

    /// Produce the node's output for `input`.
    ///
    /// `input` has already been checked against the node configuration.
    fn run(&mut self, node: &StreamConverterNode, input: &Tensor) -> Result<Tensor>;
}

/// Dispatches execution requests to the functional or cosim executor.
pub struct ExecutionEngine<B> {
    functional: FunctionalExecutor,
    cosim: CosimExecutor<B>,
    default_mode: ExecMode,
}

impl<B: CosimBackend> ExecutionEngine<B> {
    pub fn new(backend: B) -> Self {
        Self {
            functional: FunctionalExecutor,
            cosim: CosimExecutor::new(backend),
            default_mode: ExecMode::Functional,
        }
    }

    /// Engine using the build directory and default mode from `config`.
    pub fn from_config(config: &Config, backend: B) -> Result<Self> {
        let mut engine = Self::new(backend).with_build_dir(config.build_dir());
        engine.default_mode = config.exec_mode()?;
        Ok(engine)
    }

    /// Root searched for `project_<name>` when a node has no IP directory.
    pub fn with_build_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cosim = self.cosim.with_fallback_dir(dir);
        self
    }

    /// Mode used by [`execute_default`](Self::execute_default) when the node
    /// does not name one.
    pub fn with_default_mode(mut self, mode: ExecMode) -> Self {
        self.default_mode = mode;
        self
    }

    pub fn backend(&self) -> &B {
        self.cosim.backend()
    }

    pub fn backend_mut(&mut self) -> &mut B {
        self.cosim.backend_mut()
    }

    /// Execute the node, reading its input from and writing its output to `context`.
    pub fn execute(
        &mut self,
        node: &StreamConverterNode,
        context: &mut ExecutionContext,
        mode: ExecMode,
    ) -> Result<()> {
        let input_name = node.input_name()?;
        let output_name = node.output_name()?.to_string();
        let input = context.get(input_name).ok_or_else(|| {
            DwcError::validation(format!(
                "execution context has no tensor {:?} for {}",
                input_name,
                node.name()
            ))
        })?;

        let output = self.run(node, input, mode)?;
        context.insert(output_name, output);
        Ok(())
    }

    /// Execute using the node's `exec_mode` attribute, else the engine default.
    pub fn execute_default(
        &mut self,
        node: &StreamConverterNode,
        context: &mut ExecutionContext,
    ) -> Result<()> {
        let mode = match node.attributes().exec_mode.as_deref() {
            Some(tag) => tag.parse()?,
            None => self.default_mode,
        };
        self.execute(node, context, mode)
    }

    /// Evaluate the node on a tensor without going through a context.
    pub fn run(&mut self, node: &StreamConverterNode, input: &Tensor, mode: ExecMode) -> Result<Tensor> {
        validate_input(node, input)?;

        let executor: &mut dyn Executor = match mode {
            ExecMode::Functional => &mut self.functional,
            ExecMode::Cosim => &mut self.cosim,
        };
        log::debug!("{}: {} run on {}", node.name(), executor.mode(), input.shape());

        let output = executor.run(node, input)?;
        check_output(node, &output)?;

        log::info!("{}: {} run completed", node.name(), mode);
        Ok(output)
    }
}

/// Entry checks shared by both modes.
fn validate_input(node: &StreamConverterNode, input: &Tensor) -> Result<()> {
    if input.shape() != node.normal_input_shape() {
        return Err(DwcError::validation(format!(
            "input shape {} does not match expected shape {}",
            input.shape(),
            node.normal_input_shape()
        )));
    }
    if input.datatype() != node.input_datatype() {
        return Err(DwcError::validation(format!(
            "input datatype {} does not match expected datatype {}",
            input.datatype(),
            node.input_datatype()
        )));
    }
    if let Some((index, value)) = input.first_disallowed() {
        return Err(DwcError::validation(format!(
            "input value {} at index {} is not a valid {}",
            value,
            index,
            input.datatype()
        )));
    }
    Ok(())
}

/// Exit postcondition shared by both modes.
fn check_output(node: &StreamConverterNode, output: &Tensor) -> Result<()> {
    if output.shape() != node.normal_output_shape() {
        return Err(DwcError::shape_mismatch(node.normal_output_shape(), output.shape()));
    }
    if output.datatype() != node.output_datatype() {
        return Err(DwcError::datatype_mismatch(node.output_datatype(), output.datatype()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosim::{artifact_path, BehaviouralBackend, CosimError, StreamInterface};
    use crate::datatype::DataType;
    use crate::node::{NodeAttributes, NodeSignature};
    use crate::packing::StreamWord;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::path::Path;

    fn node(shape: &[usize], in_width: u32, out_width: u32, dt: DataType) -> StreamConverterNode {
        StreamConverterNode::new(
            NodeSignature::new("dwc0", "inp", "outp"),
            NodeAttributes::new(shape, in_width, out_width, dt),
        )
        .unwrap()
    }

    /// Node whose IP directory contains a (placeholder) compiled artifact.
    fn built_node(
        dir: &Path,
        shape: &[usize],
        in_width: u32,
        out_width: u32,
        dt: DataType,
    ) -> StreamConverterNode {
        let artifact = artifact_path(dir, "dwc0");
        std::fs::create_dir_all(artifact.parent().unwrap()).unwrap();
        std::fs::write(&artifact, "module dwc0_dwc0(); endmodule\n").unwrap();
        StreamConverterNode::new(
            NodeSignature::new("dwc0", "inp", "outp"),
            NodeAttributes::new(shape, in_width, out_width, dt).with_ipgen_dir(dir),
        )
        .unwrap()
    }

    fn engine() -> ExecutionEngine<BehaviouralBackend> {
        ExecutionEngine::new(BehaviouralBackend::new())
    }

    #[test]
    fn test_exec_mode_tags() {
        assert_eq!("npysim".parse::<ExecMode>().unwrap(), ExecMode::Functional);
        assert_eq!("functional".parse::<ExecMode>().unwrap(), ExecMode::Functional);
        assert_eq!("rtlsim".parse::<ExecMode>().unwrap(), ExecMode::Cosim);
        assert_eq!("cosim".parse::<ExecMode>().unwrap(), ExecMode::Cosim);
        assert!("cppsim".parse::<ExecMode>().unwrap_err().is_validation());
    }

    #[test]
    fn test_functional_concrete_scenario() {
        let n = node(&[1, 4], 2, 8, DataType::UInt(2));
        let mut ctx = ExecutionContext::new();
        let x = Tensor::new([1, 4], vec![0.0, 1.0, 0.0, 1.0], DataType::UInt(2)).unwrap();
        ctx.insert("inp", x.clone());

        engine().execute(&n, &mut ctx, ExecMode::Functional).unwrap();
        assert_eq!(ctx.get("outp"), Some(&x));
        // input is left in place
        assert!(ctx.contains("inp"));
    }

    #[test]
    fn test_functional_bipolar_identity() {
        let n = node(&[2, 4], 2, 4, DataType::Bipolar);
        let x = Tensor::new([2, 4], vec![-1.0, 1.0, 1.0, -1.0, 1.0, 1.0, -1.0, -1.0], DataType::Bipolar)
            .unwrap();
        assert_eq!(engine().run(&n, &x, ExecMode::Functional).unwrap(), x);
    }

    #[test]
    fn test_rejects_wrong_shape() {
        let n = node(&[1, 4], 2, 8, DataType::UInt(2));
        let x = Tensor::zeros([4], DataType::UInt(2));
        for mode in [ExecMode::Functional, ExecMode::Cosim] {
            assert!(engine().run(&n, &x, mode).unwrap_err().is_validation());
        }
    }

    #[test]
    fn test_rejects_wrong_datatype() {
        let n = node(&[1, 4], 2, 8, DataType::UInt(2));
        let x = Tensor::zeros([1, 4], DataType::Int(2));
        assert!(engine().run(&n, &x, ExecMode::Functional).unwrap_err().is_validation());
    }

    #[test]
    fn test_rejects_unrepresentable_bipolar() {
        let n = node(&[1, 4], 2, 4, DataType::Bipolar);
        let x = Tensor::new([1, 4], vec![0.0, 1.0, 0.0, 1.0], DataType::Bipolar).unwrap();
        assert!(engine().run(&n, &x, ExecMode::Functional).unwrap_err().is_validation());
    }

    #[test]
    fn test_missing_context_entry() {
        let n = node(&[1, 4], 2, 8, DataType::UInt(2));
        let mut ctx = ExecutionContext::new();
        let err = engine().execute(&n, &mut ctx, ExecMode::Functional).unwrap_err();
        assert!(err.is_validation());
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_cosim_matches_functional() {
        let dir = tempfile::tempdir().unwrap();
        let n = built_node(dir.path(), &[2, 8], 4, 16, DataType::Int(4));
        let x = Tensor::new(
            [2, 8],
            vec![-8.0, -1.0, 0.0, 7.0, 3.0, -4.0, 2.0, 1.0, 0.0, 0.0, 5.0, -5.0, 6.0, -6.0, 1.0, -2.0],
            DataType::Int(4),
        )
        .unwrap();

        let mut e = engine();
        let cosim = e.run(&n, &x, ExecMode::Cosim).unwrap();
        let functional = e.run(&n, &x, ExecMode::Functional).unwrap();
        assert_eq!(cosim, functional);
        assert_eq!(e.backend().last_run().map(|s| s.out_words), Some(4));
    }

    #[test]
    fn test_cosim_bipolar_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let n = built_node(dir.path(), &[1, 8], 8, 2, DataType::Bipolar);
        let x = Tensor::new([1, 8], vec![1.0, -1.0, -1.0, 1.0, 1.0, 1.0, -1.0, -1.0], DataType::Bipolar)
            .unwrap();
        assert_eq!(engine().run(&n, &x, ExecMode::Cosim).unwrap(), x);
    }

    #[test]
    fn test_cosim_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let n = StreamConverterNode::new(
            NodeSignature::new("dwc0", "inp", "outp"),
            NodeAttributes::new([1, 4], 2, 8, DataType::UInt(2)).with_ipgen_dir(dir.path()),
        )
        .unwrap();
        let mut ctx = ExecutionContext::new();
        ctx.insert("inp", Tensor::zeros([1, 4], DataType::UInt(2)));

        let err = engine().execute(&n, &mut ctx, ExecMode::Cosim).unwrap_err();
        assert!(err.is_missing_artifact());
        assert!(!ctx.contains("outp"));
    }

    #[test]
    fn test_cosim_without_any_ipgen_dir() {
        let n = node(&[1, 4], 2, 8, DataType::UInt(2));
        let x = Tensor::zeros([1, 4], DataType::UInt(2));
        assert!(engine().run(&n, &x, ExecMode::Cosim).unwrap_err().is_missing_artifact());
    }

    #[test]
    fn test_cosim_fallback_build_dir() {
        let dir = tempfile::tempdir().unwrap();
        // artifact exists under the engine's build dir, node has no ipgen dir
        built_node(dir.path(), &[1, 4], 2, 8, DataType::UInt(2));
        let n = node(&[1, 4], 2, 8, DataType::UInt(2));
        let x = Tensor::new([1, 4], vec![3.0, 2.0, 1.0, 0.0], DataType::UInt(2)).unwrap();
        let mut e = engine().with_build_dir(dir.path());
        assert_eq!(e.run(&n, &x, ExecMode::Cosim).unwrap(), x);
    }

    /// Backend that drops the last output word.
    struct TruncatingBackend(BehaviouralBackend);

    impl CosimBackend for TruncatingBackend {
        fn name(&self) -> &str {
            "truncating"
        }

        fn simulate(
            &mut self,
            artifact: &Path,
            input: &[StreamWord],
            io: &StreamInterface,
        ) -> std::result::Result<Vec<StreamWord>, CosimError> {
            let mut out = self.0.simulate(artifact, input, io)?;
            out.pop();
            Ok(out)
        }
    }

    #[test]
    fn test_cosim_short_output_is_shape_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let n = built_node(dir.path(), &[1, 8], 8, 4, DataType::UInt(2));
        let x = Tensor::zeros([1, 8], DataType::UInt(2));
        let mut e = ExecutionEngine::new(TruncatingBackend(BehaviouralBackend::new()));
        assert!(e.run(&n, &x, ExecMode::Cosim).unwrap_err().is_shape_mismatch());
    }

    #[test]
    fn test_execute_default_uses_node_mode() {
        let n = StreamConverterNode::new(
            NodeSignature::new("dwc0", "inp", "outp"),
            NodeAttributes::new([1, 4], 2, 8, DataType::UInt(2)).with_exec_mode("rtlsim"),
        )
        .unwrap();
        let mut ctx = ExecutionContext::new();
        ctx.insert("inp", Tensor::zeros([1, 4], DataType::UInt(2)));
        // rtlsim selected, no artifact anywhere
        let err = engine().execute_default(&n, &mut ctx).unwrap_err();
        assert!(err.is_missing_artifact());

        let bad = StreamConverterNode::new(
            NodeSignature::new("dwc0", "inp", "outp"),
            NodeAttributes::new([1, 4], 2, 8, DataType::UInt(2)).with_exec_mode("hwemu"),
        )
        .unwrap();
        assert!(engine().execute_default(&bad, &mut ctx).unwrap_err().is_validation());
    }

    /// Legal node configuration plus an input of matching shape.
    fn legal_case() -> impl Strategy<Value = (Vec<usize>, u32, u32, DataType, Vec<f32>)> {
        let dt = prop_oneof![
            Just(DataType::Binary),
            Just(DataType::Bipolar),
            Just(DataType::Ternary),
            (1u32..=8).prop_map(DataType::UInt),
            (2u32..=8).prop_map(DataType::Int),
        ];
        (dt, 1usize..=3, 1u32..=4, 1u32..=4, 1usize..=2, any::<bool>()).prop_flat_map(
            |(dt, outer, base, ratio, extra, widen)| {
                let bits = dt.storage_bits();
                let small = bits * base;
                let large = small * ratio;
                let channels = (base * ratio) as usize * extra;
                let (in_w, out_w) = if widen { (small, large) } else { (large, small) };
                let value = if dt == DataType::Bipolar {
                    prop_oneof![Just(-1.0f32), Just(1.0f32)].boxed()
                } else {
                    ((dt.min() as i64)..=(dt.max() as i64)).prop_map(|v| v as f32).boxed()
                };
                (
                    Just(vec![outer, channels]),
                    Just(in_w),
                    Just(out_w),
                    Just(dt),
                    prop::collection::vec(value, outer * channels),
                )
            },
        )
    }

    proptest! {
        #[test]
        fn prop_functional_is_identity((shape, in_w, out_w, dt, values) in legal_case()) {
            let n = node(&shape, in_w, out_w, dt);
            let x = Tensor::new(shape.clone(), values, dt).unwrap();
            prop_assert_eq!(engine().run(&n, &x, ExecMode::Functional).unwrap(), x);
        }

        #[test]
        fn prop_cosim_equals_functional((shape, in_w, out_w, dt, values) in legal_case()) {
            let dir = tempfile::tempdir().unwrap();
            let n = built_node(dir.path(), &shape, in_w, out_w, dt);
            let x = Tensor::new(shape.clone(), values, dt).unwrap();
            let mut e = engine();
            let cosim = e.run(&n, &x, ExecMode::Cosim).unwrap();
            let functional = e.run(&n, &x, ExecMode::Functional).unwrap();
            prop_assert_eq!(cosim, functional);
        }
    }
}
