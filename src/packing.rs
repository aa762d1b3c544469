//! Bit-accurate packing of tensors into fixed-width stream words.
//!
//! # Word Layout
//!
//! A word of `W` bits is stored as `ceil(W / 8)` little-endian bytes. Element
//! `i` of a word occupies bits `[i * b, (i + 1) * b)` where `b` is the element
//! storage bitwidth, so the first element sits in the least significant bits:
//!
//! ```text
//! UINT2, W = 8, elements [e0, e1, e2, e3]
//!
//!   bit   7 6 | 5 4 | 3 2 | 1 0
//!         e3  | e2  | e1  | e0
//! ```
//!
//! Signed types are stored two's-complement and sign-extended on unpack.
//! FLOAT32 is stored as its IEEE-754 bit pattern. BIPOLAR goes through its
//! storage encoding first and travels as 1-bit BINARY.
//!
//! Words are exchanged with external simulators as hex strings (`0x…`,
//! most significant digit first).

use std::fmt;

use crate::datatype::DataType;
use crate::error::{DwcError, Result};
use crate::folding::compute_folded_shape;
use crate::shape::Shape;
use crate::tensor::Tensor;

/// One transfer on a stream of a fixed bit width.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct StreamWord {
    width: u32,
    bytes: Vec<u8>,
}

impl StreamWord {
    /// All-zero word of `width` bits.
    pub fn zeroed(width: u32) -> Self {
        Self {
            width,
            bytes: vec![0; width.div_ceil(8) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// Little-endian backing bytes. Bits above `width` are always zero.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn bit(&self, index: u32) -> bool {
        debug_assert!(index < self.width);
        (self.bytes[(index / 8) as usize] >> (index % 8)) & 1 == 1
    }

    #[inline]
    pub fn set_bit(&mut self, index: u32, value: bool) {
        debug_assert!(index < self.width);
        let byte = &mut self.bytes[(index / 8) as usize];
        let mask = 1u8 << (index % 8);
        if value {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }

    /// Read `len` (<= 64) bits starting at `offset`.
    pub fn get_bits(&self, offset: u32, len: u32) -> u64 {
        debug_assert!(len <= 64 && offset + len <= self.width);
        (0..len).fold(0u64, |acc, i| acc | ((self.bit(offset + i) as u64) << i))
    }

    /// Write the low `len` (<= 64) bits of `value` starting at `offset`.
    pub fn set_bits(&mut self, offset: u32, len: u32, value: u64) {
        debug_assert!(len <= 64 && offset + len <= self.width);
        for i in 0..len {
            self.set_bit(offset + i, (value >> i) & 1 == 1);
        }
    }

    /// Hex rendering, most significant digit first, `ceil(width / 4)` digits.
    pub fn to_hex(&self) -> String {
        let digits = self.width.div_ceil(4);
        let mut s = String::with_capacity(2 + digits as usize);
        s.push_str("0x");
        for d in (0..digits).rev() {
            let lo = d * 4;
            let len = 4u32.min(self.width - lo);
            let nibble = self.get_bits(lo, len) as u32;
            s.push(char::from_digit(nibble, 16).unwrap_or('0'));
        }
        s
    }

    /// Parse a hex word (with or without `0x`) into a word of `width` bits.
    ///
    /// Returns `None` for non-hex characters or set bits above `width`.
    pub fn from_hex(text: &str, width: u32) -> Option<Self> {
        let text = text.trim();
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .unwrap_or(text);
        if digits.is_empty() {
            return None;
        }

        let mut word = Self::zeroed(width);
        for (pos, ch) in digits.chars().rev().enumerate() {
            let nibble = ch.to_digit(16)?;
            for b in 0..4 {
                if (nibble >> b) & 1 == 0 {
                    continue;
                }
                let index = pos as u32 * 4 + b;
                if index >= width {
                    return None;
                }
                word.set_bit(index, true);
            }
        }
        Some(word)
    }
}

impl fmt::Debug for StreamWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamWord<{}>({})", self.width, self.to_hex())
    }
}

/// Storage bit pattern of one (already storage-encoded) element.
fn element_to_raw(storage: DataType, value: f32) -> u64 {
    let bits = storage.bitwidth();
    let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
    match storage {
        DataType::Float32 => value.to_bits() as u64,
        dt if dt.signed() => (value as i64 as u64) & mask,
        _ => (value as u64) & mask,
    }
}

/// Inverse of [`element_to_raw`].
fn raw_to_element(storage: DataType, raw: u64) -> f32 {
    let bits = storage.bitwidth();
    match storage {
        DataType::Float32 => f32::from_bits(raw as u32),
        dt if dt.signed() => {
            let shift = 64 - bits;
            (((raw << shift) as i64) >> shift) as f32
        }
        _ => raw as f32,
    }
}

/// Pack a tensor into words of `stream_width` bits.
///
/// The tensor's innermost axis is folded to `stream_width / bits` elements per
/// word; the outer axes (row-major) give the word order.
pub fn pack(tensor: &Tensor, stream_width: u32) -> Result<Vec<StreamWord>> {
    let datatype = tensor.datatype();
    if let Some((index, value)) = tensor.first_disallowed() {
        return Err(DwcError::validation(format!(
            "value {} at index {} is not representable as {}",
            value, index, datatype
        )));
    }

    let storage = datatype.storage_type();
    let bits = storage.bitwidth();
    let folded = compute_folded_shape(tensor.shape(), stream_width, bits)?;
    let elems_per_word = folded.last_dim().unwrap_or(1);

    let words: Vec<StreamWord> = tensor
        .data()
        .chunks(elems_per_word)
        .map(|chunk| {
            let mut word = StreamWord::zeroed(stream_width);
            for (i, &value) in chunk.iter().enumerate() {
                let raw = element_to_raw(storage, datatype.encode_storage(value));
                word.set_bits(i as u32 * bits, bits, raw);
            }
            word
        })
        .collect();

    debug_assert_eq!(words.len(), folded.outer_count());
    Ok(words)
}

/// Unpack words of `stream_width` bits into a tensor of logical `shape`.
///
/// Fails with a shape mismatch when the word count or any word width does not
/// match what `shape` requires at this stream width.
pub fn unpack(
    words: &[StreamWord],
    datatype: DataType,
    stream_width: u32,
    shape: &Shape,
) -> Result<Tensor> {
    let storage = datatype.storage_type();
    let bits = storage.bitwidth();
    let folded = compute_folded_shape(shape, stream_width, bits)?;
    let expected_words = folded.outer_count();
    if words.len() != expected_words {
        return Err(DwcError::ShapeMismatch(format!(
            "{} words of {} bits do not fill shape {} (expected {})",
            words.len(),
            stream_width,
            shape,
            expected_words
        )));
    }
    if let Some(w) = words.iter().find(|w| w.width() != stream_width) {
        return Err(DwcError::ShapeMismatch(format!(
            "stream word of {} bits on a {}-bit stream",
            w.width(),
            stream_width
        )));
    }

    let elems_per_word = folded.last_dim().unwrap_or(1);
    let mut data = Vec::with_capacity(shape.elem_count());
    for word in words {
        for i in 0..elems_per_word as u32 {
            let raw = word.get_bits(i * bits, bits);
            data.push(datatype.decode_storage(raw_to_element(storage, raw)));
        }
    }
    Tensor::new(shape.clone(), data, datatype)
}
