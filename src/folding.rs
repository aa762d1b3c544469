//! Width folding: how a logical tensor maps onto a fixed-width stream.
//!
//! A stream of width `W` carries `W / bits` elements per transfer. Folding a
//! logical shape `[..., C]` splits the channel axis into
//! `[C / elems_per_word, elems_per_word]`, so the product of every dimension
//! except the last is the number of transfers (words) needed to move the
//! whole tensor.
//!
//! ```text
//! shape [1, 4], 2-bit elements
//!
//!   in_width = 2  ->  1 elem/word  ->  [1, 4, 1]   (4 words)
//!   out_width = 8 ->  4 elems/word ->  [1, 1, 4]   (1 word)
//! ```

use crate::error::{DwcError, Result};
use crate::shape::Shape;

/// Compute the folded shape for a stream of `stream_width` bits.
///
/// Fails when the stream width is not a whole number of elements, or when the
/// channel count does not split evenly into words.
pub fn compute_folded_shape(shape: &Shape, stream_width: u32, element_bits: u32) -> Result<Shape> {
    if element_bits == 0 || stream_width == 0 {
        return Err(DwcError::config(format!(
            "stream width ({}) and element bits ({}) must be positive",
            stream_width, element_bits
        )));
    }
    if stream_width % element_bits != 0 {
        return Err(DwcError::config(format!(
            "stream width {} is not divisible by element bitwidth {}",
            stream_width, element_bits
        )));
    }
    let channels = shape
        .last_dim()
        .ok_or_else(|| DwcError::config("cannot fold a rank-0 shape"))?;

    let elems_per_word = (stream_width / element_bits) as usize;
    if channels % elems_per_word != 0 {
        return Err(DwcError::config(format!(
            "channel count {} not divisible by elements-per-word {} ({} bits / {} bits)",
            channels, elems_per_word, stream_width, element_bits
        )));
    }

    let folded = shape.split_last(elems_per_word);
    debug_assert_eq!(folded.elem_count(), shape.elem_count());
    Ok(folded)
}

/// Check that one stream width evenly divides the other.
///
/// Equal widths form a pass-through converter and are always legal.
pub fn validate_width_relation(in_width: u32, out_width: u32) -> Result<()> {
    if in_width == 0 || out_width == 0 {
        return Err(DwcError::config(format!(
            "stream widths must be positive (in {}, out {})",
            in_width, out_width
        )));
    }
    if in_width > out_width && in_width % out_width != 0 {
        return Err(DwcError::config(format!(
            "in width {} is larger than out width {} but not a multiple of it; \
             adjust PE/SIMD so that in % out == 0",
            in_width, out_width
        )));
    }
    if out_width > in_width && out_width % in_width != 0 {
        return Err(DwcError::config(format!(
            "out width {} is larger than in width {} but not a multiple of it; \
             adjust PE/SIMD so that out % in == 0",
            out_width, in_width
        )));
    }
    Ok(())
}

/// Smallest multiple of `multiple` that is `>= value`, or `None` if it does
/// not fit in a `u32`.
#[inline]
pub fn roundup_to_multiple(value: u32, multiple: u32) -> Option<u32> {
    if multiple == 0 {
        return Some(value);
    }
    value.div_ceil(multiple).checked_mul(multiple)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_fold_concrete_scenario() {
        let shape = Shape::from([1, 4]);
        assert_eq!(compute_folded_shape(&shape, 2, 2).unwrap(), Shape::from([1, 4, 1]));
        assert_eq!(compute_folded_shape(&shape, 8, 2).unwrap(), Shape::from([1, 1, 4]));
    }

    #[test]
    fn test_fold_rejects_partial_element() {
        let err = compute_folded_shape(&Shape::from([1, 8]), 10, 4).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_fold_rejects_uneven_channels() {
        let err = compute_folded_shape(&Shape::from([1, 6]), 16, 4).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("not divisible by elements-per-word"));
    }

    #[test]
    fn test_fold_rejects_rank_zero() {
        assert!(compute_folded_shape(&Shape::default(), 8, 1).is_err());
    }

    #[test]
    fn test_width_relation() {
        assert!(validate_width_relation(24, 10).unwrap_err().is_configuration());
        assert!(validate_width_relation(10, 24).is_err());
        assert!(validate_width_relation(8, 8).is_ok());
        assert!(validate_width_relation(32, 8).is_ok());
        assert!(validate_width_relation(8, 32).is_ok());
        assert!(validate_width_relation(0, 8).is_err());
    }

    #[test]
    fn test_roundup() {
        assert_eq!(roundup_to_multiple(1, 8), Some(8));
        assert_eq!(roundup_to_multiple(8, 8), Some(8));
        assert_eq!(roundup_to_multiple(9, 8), Some(16));
        assert_eq!(roundup_to_multiple(0, 8), Some(0));
        assert_eq!(roundup_to_multiple(u32::MAX - 7, 8), Some(u32::MAX - 7));
        assert_eq!(roundup_to_multiple(u32::MAX, 8), None);
    }

    /// Legal (shape, in_width, out_width, bits) tuples built from their factors.
    fn legal_config() -> impl Strategy<Value = (Vec<usize>, u32, u32, u32)> {
        (
            prop::collection::vec(1usize..=4, 0..=2),
            1u32..=8,
            1u32..=4,
            1u32..=4,
            1usize..=3,
            any::<bool>(),
        )
            .prop_map(|(outer, bits, base_elems, ratio, extra, widen)| {
                let small = bits * base_elems;
                let large = small * ratio;
                let channels = (base_elems * ratio) as usize * extra;
                let mut shape = outer;
                shape.push(channels);
                if widen {
                    (shape, small, large, bits)
                } else {
                    (shape, large, small, bits)
                }
            })
    }

    proptest! {
        #[test]
        fn prop_folding_preserves_elements((dims, in_w, out_w, bits) in legal_config()) {
            let shape = Shape::from(dims);
            let fin = compute_folded_shape(&shape, in_w, bits).unwrap();
            let fout = compute_folded_shape(&shape, out_w, bits).unwrap();
            prop_assert_eq!(fin.elem_count(), shape.elem_count());
            prop_assert_eq!(fout.elem_count(), shape.elem_count());
            prop_assert_eq!(fin.rank(), shape.rank() + 1);
        }

        #[test]
        fn prop_total_bits_conserved((dims, in_w, out_w, bits) in legal_config()) {
            let shape = Shape::from(dims);
            validate_width_relation(in_w, out_w).unwrap();
            let in_words = compute_folded_shape(&shape, in_w, bits).unwrap().outer_count();
            let out_words = compute_folded_shape(&shape, out_w, bits).unwrap().outer_count();
            prop_assert_eq!(in_words as u64 * in_w as u64, out_words as u64 * out_w as u64);
        }
    }
}
