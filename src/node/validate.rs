//! Structural checks reported as advisory diagnostics.
//!
//! These never fail and never touch the width algebra. Each check contributes
//! exactly one line, in a fixed order, whether it passed or not; the compiler's
//! diagnostics pass decides what to do with them.

use super::converter::{NodeSignature, StreamConverterNode};

/// Domain the converter must be registered under.
pub const EXPECTED_DOMAIN: &str = "finn";
/// Backend tag the converter must carry.
pub const EXPECTED_BACKEND: &str = "fpgadataflow";

/// Run all structural checks on a node description.
pub fn verify_node(signature: &NodeSignature, backend: Option<&str>) -> Vec<String> {
    let mut messages = Vec::with_capacity(3);

    if signature.domain == EXPECTED_DOMAIN {
        messages.push("Attribute domain is set correctly".to_string());
    } else {
        messages.push(format!("Attribute domain should be set to \"{}\"", EXPECTED_DOMAIN));
    }

    if backend == Some(EXPECTED_BACKEND) {
        messages.push("Attribute backend is set correctly".to_string());
    } else {
        messages.push(format!("Attribute backend should be set to \"{}\"", EXPECTED_BACKEND));
    }

    if signature.inputs.len() == 1 {
        messages.push("The number of inputs is correct".to_string());
    } else {
        messages.push("StreamingDWC needs 1 data input".to_string());
    }

    messages
}

impl StreamConverterNode {
    /// Structural diagnostics for this node.
    pub fn verify(&self) -> Vec<String> {
        verify_node(self.signature(), self.attributes().backend.as_deref())
    }
}
