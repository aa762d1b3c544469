//! Functional (logical reference) evaluation.

use crate::error::Result;
use crate::node::StreamConverterNode;
use crate::tensor::Tensor;

use super::{ExecMode, Executor};

/// Evaluates a converter on logical values only.
///
/// Width conversion changes packing, never values. The input is mapped to
/// its storage encoding and folded to the input stream shape, which proves it
/// can be streamed; the values are then unfolded to the output shape and
/// decoded again.
#[derive(Debug, Default, Clone, Copy)]
pub struct FunctionalExecutor;

impl Executor for FunctionalExecutor {
    fn mode(&self) -> ExecMode {
        ExecMode::Functional
    }

    fn run(&mut self, node: &StreamConverterNode, input: &Tensor) -> Result<Tensor> {
        let in_dt = node.input_datatype();
        let out_dt = node.output_datatype();

        let stored = input
            .clone()
            .map(in_dt.storage_type(), |v| in_dt.encode_storage(v));
        let folded = stored.reshape(node.folded_input_shape()?)?;
        log::debug!(
            "{}: input folds to {} ({} words of {} bits)",
            node.name(),
            folded.shape(),
            folded.shape().outer_count(),
            node.in_stream_width(false)
        );

        let unfolded = folded.reshape(node.normal_output_shape().clone())?;
        Ok(unfolded.map(out_dt, |v| out_dt.decode_storage(v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::DataType;
    use crate::node::{NodeAttributes, NodeSignature};

    #[test]
    fn test_run_directly() {
        let node = StreamConverterNode::new(
            NodeSignature::new("dwc", "a", "b"),
            NodeAttributes::new([3, 6], 6, 2, DataType::Ternary),
        )
        .unwrap();
        let x = Tensor::new([3, 6], (0..18).map(|i| (i % 3) as f32 - 1.0).collect(), DataType::Ternary)
            .unwrap();
        let mut exec = FunctionalExecutor;
        assert_eq!(exec.mode(), ExecMode::Functional);
        assert_eq!(exec.run(&node, &x).unwrap(), x);
    }
}
