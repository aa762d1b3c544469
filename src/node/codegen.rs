//! HLS code fragments contributed by the converter.
//!
//! The surrounding compiler owns the C++ template and substitutes these lines
//! for its `$PLACEHOLDER$` markers. Only the converter-specific content lives
//! here.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;

use super::converter::{StreamConverterNode, OP_TYPE};

/// Placeholder → lines to substitute.
pub type CodeGenDict = BTreeMap<&'static str, Vec<String>>;

/// Number of repetitions the generated kernel processes per invocation.
const NUM_REPS: u32 = 1;

impl StreamConverterNode {
    /// Produce every template fragment for this node.
    ///
    /// `code_gen_dir` is where the functional harness reads `input_0.npy`
    /// and writes `output.npy`.
    pub fn code_gen_fragments(&self, code_gen_dir: &Path) -> Result<CodeGenDict> {
        let in_bits = self.in_stream_width(false);
        let out_bits = self.out_stream_width(false);
        // BIPOLAR is stored as BINARY on the wire
        let in_store = self.input_datatype().storage_type();
        let out_store = self.output_datatype().storage_type();
        let folded_out = self.folded_output_shape()?;
        let dir = code_gen_dir.display();

        let mut dict = CodeGenDict::new();
        dict.insert("$GLOBALS$", vec!["#include \"streamtools.h\"".to_string()]);
        dict.insert(
            "$DEFINES$",
            vec![
                format!("#define InWidth {} ", in_bits),
                format!("#define OutWidth {} ", out_bits),
                format!("#define NumInWords {} ", self.num_in_words()),
                format!("#define numReps {}", NUM_REPS),
            ],
        );
        dict.insert(
            "$READNPYDATA$",
            vec![format!(
                "npy2apintstream<ap_uint<{}>, {}, {}, float>(\"{}/input_0.npy\", in0);",
                in_bits,
                in_store.hls_type(),
                in_store.bitwidth(),
                dir
            )],
        );
        dict.insert(
            "$STREAMDECLARATIONS$",
            vec![
                format!("hls::stream<ap_uint<{}>> in0 (\"in0\");", in_bits),
                format!("hls::stream<ap_uint<{}>> out (\"out\");", out_bits),
            ],
        );
        dict.insert(
            "$DOCOMPUTE$",
            vec![format!(
                "{}<InWidth, OutWidth, NumInWords>(in0, out, numReps);",
                OP_TYPE
            )],
        );
        dict.insert(
            "$DATAOUTSTREAM$",
            vec![format!(
                "apintstream2npy<ap_uint<{}>, {}, {}, float>(out, {}, \"{}/output.npy\");",
                out_bits,
                out_store.hls_type(),
                out_store.bitwidth(),
                cpp_shape(folded_out.dims()),
                dir
            )],
        );
        dict.insert("$SAVEASCNPY$", Vec::new());
        dict.insert(
            "$BLACKBOXFUNCTION$",
            vec![format!(
                "void {}(hls::stream<ap_uint<{}> > &in0, hls::stream<ap_uint<{}> > &out)",
                self.name(),
                in_bits,
                out_bits
            )],
        );
        dict.insert(
            "$PRAGMAS$",
            vec![
                "#pragma HLS INTERFACE axis port=in0".to_string(),
                "#pragma HLS INTERFACE axis port=out".to_string(),
                "#pragma HLS INTERFACE ap_ctrl_none port=return".to_string(),
            ],
        );
        Ok(dict)
    }
}

/// Render a shape as a C++ brace initializer, e.g. `{1, 1, 4}`.
fn cpp_shape(dims: &[usize]) -> String {
    let inner: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
    format!("{{{}}}", inner.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::DataType;
    use crate::node::{NodeAttributes, NodeSignature};
    use pretty_assertions::assert_eq;

    fn dict(dt: DataType) -> CodeGenDict {
        let node = StreamConverterNode::new(
            NodeSignature::new("StreamingDataWidthConverter_Batch_0", "a", "b"),
            NodeAttributes::new([1, 4], 2, 8, dt),
        )
        .unwrap();
        node.code_gen_fragments(Path::new("/tmp/cg")).unwrap()
    }

    #[test]
    fn test_defines() {
        let d = dict(DataType::UInt(2));
        assert_eq!(
            d["$DEFINES$"],
            vec![
                "#define InWidth 2 ",
                "#define OutWidth 8 ",
                "#define NumInWords 4 ",
                "#define numReps 1",
            ]
        );
        assert_eq!(
            d["$DOCOMPUTE$"][0],
            "StreamingDataWidthConverter_Batch<InWidth, OutWidth, NumInWords>(in0, out, numReps);"
        );
    }

    #[test]
    fn test_data_io_lines() {
        let d = dict(DataType::UInt(2));
        assert_eq!(
            d["$READNPYDATA$"][0],
            "npy2apintstream<ap_uint<2>, ap_uint<2>, 2, float>(\"/tmp/cg/input_0.npy\", in0);"
        );
        assert_eq!(
            d["$DATAOUTSTREAM$"][0],
            "apintstream2npy<ap_uint<8>, ap_uint<2>, 2, float>(out, {1, 1, 4}, \"/tmp/cg/output.npy\");"
        );
    }

    #[test]
    fn test_bipolar_stored_as_binary() {
        let node = StreamConverterNode::new(
            NodeSignature::new("dwc", "a", "b"),
            NodeAttributes::new([1, 8], 2, 8, DataType::Bipolar),
        )
        .unwrap();
        let d = node.code_gen_fragments(Path::new("cg")).unwrap();
        assert!(d["$READNPYDATA$"][0].contains("ap_uint<1>, 1, float"));
        assert!(d["$DATAOUTSTREAM$"][0].contains("{1, 1, 8}"));
    }

    #[test]
    fn test_blackbox_and_pragmas() {
        let d = dict(DataType::UInt(2));
        assert_eq!(
            d["$BLACKBOXFUNCTION$"][0],
            "void StreamingDataWidthConverter_Batch_0(hls::stream<ap_uint<2> > &in0, hls::stream<ap_uint<8> > &out)"
        );
        assert_eq!(d["$PRAGMAS$"].len(), 3);
        assert!(d["$SAVEASCNPY$"].is_empty());
    }
}
