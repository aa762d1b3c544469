//! Element datatypes for streamed tensors.
//!
//! Tensors travel through the pipeline as `f32` arrays, but each one carries a
//! *logical* datatype that fixes how many bits an element occupies on a
//! stream and which values are legal.
//!
//! | Tag       | Bits | Values            | Storage   |
//! |-----------|------|-------------------|-----------|
//! | `BINARY`  | 1    | {0, 1}            | itself    |
//! | `BIPOLAR` | 1    | {-1, +1}          | `BINARY`  |
//! | `TERNARY` | 2    | {-1, 0, +1}       | itself    |
//! | `UINT<n>` | n    | [0, 2^n - 1]      | itself    |
//! | `INT<n>`  | n    | [-2^(n-1), 2^(n-1) - 1] | itself |
//! | `FLOAT32` | 32   | any finite f32    | itself    |
//!
//! BIPOLAR never materializes in hardware: it is stored as BINARY through
//! [`DataType::encode_storage`] and recovered with [`DataType::decode_storage`].

use std::fmt;
use std::str::FromStr;

use crate::error::DwcError;

/// Widest integer type accepted on a stream.
pub const MAX_INT_BITS: u32 = 32;

/// Logical element datatype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Binary,
    Bipolar,
    Ternary,
    /// Unsigned integer of the given bitwidth.
    UInt(u32),
    /// Two's-complement signed integer of the given bitwidth.
    Int(u32),
    Float32,
}

impl DataType {
    /// Bits one element occupies in its *declared* form.
    pub fn bitwidth(&self) -> u32 {
        match self {
            DataType::Binary | DataType::Bipolar => 1,
            DataType::Ternary => 2,
            DataType::UInt(n) | DataType::Int(n) => *n,
            DataType::Float32 => 32,
        }
    }

    /// Whether values may be negative.
    pub fn signed(&self) -> bool {
        matches!(
            self,
            DataType::Bipolar | DataType::Ternary | DataType::Int(_) | DataType::Float32
        )
    }

    /// Reject integer bitwidths outside the supported range.
    ///
    /// UINT needs at least 1 bit and INT at least 2; neither may exceed
    /// [`MAX_INT_BITS`].
    pub fn check_supported(&self) -> Result<(), DwcError> {
        let (min_bits, bits) = match self {
            DataType::UInt(n) => (1, *n),
            DataType::Int(n) => (2, *n),
            _ => return Ok(()),
        };
        if bits < min_bits || bits > MAX_INT_BITS {
            return Err(DwcError::config(format!(
                "datatype {} out of supported range ({}..={} bits)",
                self, min_bits, MAX_INT_BITS
            )));
        }
        Ok(())
    }

    /// Smallest representable value.
    pub fn min(&self) -> f64 {
        match self {
            DataType::Binary | DataType::UInt(_) => 0.0,
            DataType::Bipolar | DataType::Ternary => -1.0,
            DataType::Int(n) => -((1u64 << (n - 1)) as f64),
            DataType::Float32 => f32::MIN as f64,
        }
    }

    /// Largest representable value.
    pub fn max(&self) -> f64 {
        match self {
            DataType::Binary | DataType::Bipolar | DataType::Ternary => 1.0,
            DataType::UInt(n) => ((1u64 << n) - 1) as f64,
            DataType::Int(n) => ((1u64 << (n - 1)) - 1) as f64,
            DataType::Float32 => f32::MAX as f64,
        }
    }

    /// Check whether `value` is a legal element of this type.
    pub fn allowed(&self, value: f32) -> bool {
        if !value.is_finite() {
            return false;
        }
        match self {
            DataType::Float32 => true,
            DataType::Bipolar => value == -1.0 || value == 1.0,
            _ => {
                let v = value as f64;
                v.fract() == 0.0 && v >= self.min() && v <= self.max()
            }
        }
    }

    /// Datatype that is physically materialized for this logical type.
    pub fn storage_type(&self) -> DataType {
        match self {
            DataType::Bipolar => DataType::Binary,
            other => *other,
        }
    }

    /// Bits one element occupies on a stream (BIPOLAR counts as 1-bit BINARY).
    pub fn storage_bits(&self) -> u32 {
        self.storage_type().bitwidth()
    }

    /// Map a logical value to its storage encoding (`{-1,+1} -> {0,1}` for BIPOLAR).
    #[inline]
    pub fn encode_storage(&self, value: f32) -> f32 {
        match self {
            DataType::Bipolar => (value + 1.0) / 2.0,
            _ => value,
        }
    }

    /// Inverse of [`encode_storage`](Self::encode_storage).
    #[inline]
    pub fn decode_storage(&self, value: f32) -> f32 {
        match self {
            DataType::Bipolar => 2.0 * value - 1.0,
            _ => value,
        }
    }

    /// Vivado HLS type used for one element.
    pub fn hls_type(&self) -> String {
        match self {
            DataType::Binary | DataType::Bipolar => "ap_uint<1>".to_string(),
            DataType::Ternary => "ap_int<2>".to_string(),
            DataType::UInt(n) => format!("ap_uint<{}>", n),
            DataType::Int(n) => format!("ap_int<{}>", n),
            DataType::Float32 => "float".to_string(),
        }
    }

    /// Canonical attribute tag, e.g. `"INT4"`.
    pub fn tag(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Binary => write!(f, "BINARY"),
            DataType::Bipolar => write!(f, "BIPOLAR"),
            DataType::Ternary => write!(f, "TERNARY"),
            DataType::UInt(n) => write!(f, "UINT{}", n),
            DataType::Int(n) => write!(f, "INT{}", n),
            DataType::Float32 => write!(f, "FLOAT32"),
        }
    }
}

impl FromStr for DataType {
    type Err = DwcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || DwcError::config(format!("unknown datatype tag {:?}", s));

        match s {
            "BINARY" => return Ok(DataType::Binary),
            "BIPOLAR" => return Ok(DataType::Bipolar),
            "TERNARY" => return Ok(DataType::Ternary),
            "FLOAT32" => return Ok(DataType::Float32),
            _ => {}
        }

        // UINT must be tried before INT since it shares the suffix
        let (ctor, digits): (fn(u32) -> DataType, &str) = if let Some(d) = s.strip_prefix("UINT") {
            (DataType::UInt, d)
        } else if let Some(d) = s.strip_prefix("INT") {
            (DataType::Int, d)
        } else {
            return Err(unknown());
        };

        let bits: u32 = digits.parse().map_err(|_| unknown())?;
        let dt = ctor(bits);
        dt.check_supported()?;
        Ok(dt)
    }
}
