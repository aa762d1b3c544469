//! Node attributes: the loosely typed table the compiler hands over, and the
//! validated record the converter actually works with.
//!
//! The table is checked once, at construction. Unknown keys, missing required
//! keys and values of the wrong kind are all rejected up front instead of on
//! first access.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::datatype::DataType;
use crate::error::{DwcError, Result};
use crate::shape::Shape;

/// Required attribute: logical tensor shape.
pub const ATTR_SHAPE: &str = "shape";
/// Required attribute: input stream width in bits.
pub const ATTR_IN_WIDTH: &str = "inWidth";
/// Required attribute: output stream width in bits.
pub const ATTR_OUT_WIDTH: &str = "outWidth";
/// Required attribute: element datatype tag.
pub const ATTR_DATA_TYPE: &str = "dataType";
/// Optional attribute: backend tag (expected `"fpgadataflow"`).
pub const ATTR_BACKEND: &str = "backend";
/// Optional attribute: default execution mode tag.
pub const ATTR_EXEC_MODE: &str = "exec_mode";
/// Optional attribute: directory holding functional-run artifacts.
pub const ATTR_CODE_GEN_DIR_NPYSIM: &str = "code_gen_dir_npysim";
/// Optional attribute: directory holding generated IP (HDL) for cosimulation.
pub const ATTR_CODE_GEN_DIR_IPGEN: &str = "code_gen_dir_ipgen";

const KNOWN_ATTRS: &[&str] = &[
    ATTR_SHAPE,
    ATTR_IN_WIDTH,
    ATTR_OUT_WIDTH,
    ATTR_DATA_TYPE,
    ATTR_BACKEND,
    ATTR_EXEC_MODE,
    ATTR_CODE_GEN_DIR_NPYSIM,
    ATTR_CODE_GEN_DIR_IPGEN,
];

/// One attribute value as it appears in a graph description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Ints(Vec<i64>),
    Str(String),
}

impl AttrValue {
    fn kind(&self) -> &'static str {
        match self {
            AttrValue::Int(_) => "int",
            AttrValue::Ints(_) => "ints",
            AttrValue::Str(_) => "string",
        }
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<Vec<i64>> for AttrValue {
    fn from(v: Vec<i64>) -> Self {
        AttrValue::Ints(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

/// Attribute table keyed by attribute name.
pub type AttributeTable = BTreeMap<String, AttrValue>;

/// Validated converter attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAttributes {
    /// Logical tensor shape, identical on both sides of the converter.
    pub shape: Shape,
    /// Bits per transfer on the input stream.
    pub in_width: u32,
    /// Bits per transfer on the output stream.
    pub out_width: u32,
    /// Element datatype, identical on both sides.
    pub datatype: DataType,
    pub backend: Option<String>,
    /// Raw exec-mode tag; parsed when a run asks for the node default.
    pub exec_mode: Option<String>,
    pub code_gen_dir_npysim: Option<PathBuf>,
    pub code_gen_dir_ipgen: Option<PathBuf>,
}

impl NodeAttributes {
    /// Attributes with only the required fields set.
    pub fn new(shape: impl Into<Shape>, in_width: u32, out_width: u32, datatype: DataType) -> Self {
        Self {
            shape: shape.into(),
            in_width,
            out_width,
            datatype,
            backend: Some("fpgadataflow".to_string()),
            exec_mode: None,
            code_gen_dir_npysim: None,
            code_gen_dir_ipgen: None,
        }
    }

    /// Set the IP generation directory used to locate the compiled hardware.
    pub fn with_ipgen_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.code_gen_dir_ipgen = Some(dir.into());
        self
    }

    /// Set the functional-run code generation directory.
    pub fn with_npysim_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.code_gen_dir_npysim = Some(dir.into());
        self
    }

    /// Set the default execution mode tag.
    pub fn with_exec_mode(mut self, mode: impl Into<String>) -> Self {
        self.exec_mode = Some(mode.into());
        self
    }

    /// Validate an attribute table into a typed record.
    pub fn from_table(table: &AttributeTable) -> Result<Self> {
        if let Some(unknown) = table.keys().find(|k| !KNOWN_ATTRS.contains(&k.as_str())) {
            return Err(DwcError::config(format!("unknown attribute {:?}", unknown)));
        }

        let dims = required_ints(table, ATTR_SHAPE)?;
        if dims.is_empty() {
            return Err(DwcError::config("attribute \"shape\" must not be empty"));
        }
        let dims = dims
            .iter()
            .map(|&d| positive(ATTR_SHAPE, d).map(|d| d as usize))
            .collect::<Result<Vec<usize>>>()?;

        let in_width = positive(ATTR_IN_WIDTH, required_int(table, ATTR_IN_WIDTH)?)?;
        let out_width = positive(ATTR_OUT_WIDTH, required_int(table, ATTR_OUT_WIDTH)?)?;
        let datatype: DataType = required_str(table, ATTR_DATA_TYPE)?.parse()?;

        Ok(Self {
            shape: Shape::from(dims),
            in_width,
            out_width,
            datatype,
            backend: optional_str(table, ATTR_BACKEND)?,
            exec_mode: optional_str(table, ATTR_EXEC_MODE)?,
            code_gen_dir_npysim: optional_str(table, ATTR_CODE_GEN_DIR_NPYSIM)?.map(PathBuf::from),
            code_gen_dir_ipgen: optional_str(table, ATTR_CODE_GEN_DIR_IPGEN)?.map(PathBuf::from),
        })
    }

    /// Render back to an attribute table.
    pub fn to_table(&self) -> AttributeTable {
        let mut table = AttributeTable::new();
        table.insert(
            ATTR_SHAPE.to_string(),
            AttrValue::Ints(self.shape.dims().iter().map(|&d| d as i64).collect()),
        );
        table.insert(ATTR_IN_WIDTH.to_string(), AttrValue::Int(self.in_width as i64));
        table.insert(ATTR_OUT_WIDTH.to_string(), AttrValue::Int(self.out_width as i64));
        table.insert(ATTR_DATA_TYPE.to_string(), AttrValue::Str(self.datatype.tag()));

        let optional = [
            (ATTR_BACKEND, self.backend.clone()),
            (ATTR_EXEC_MODE, self.exec_mode.clone()),
            (
                ATTR_CODE_GEN_DIR_NPYSIM,
                self.code_gen_dir_npysim.as_ref().map(|p| p.display().to_string()),
            ),
            (
                ATTR_CODE_GEN_DIR_IPGEN,
                self.code_gen_dir_ipgen.as_ref().map(|p| p.display().to_string()),
            ),
        ];
        for (key, value) in optional {
            if let Some(v) = value {
                table.insert(key.to_string(), AttrValue::Str(v));
            }
        }
        table
    }
}

fn lookup<'a>(table: &'a AttributeTable, key: &str) -> Result<&'a AttrValue> {
    table
        .get(key)
        .ok_or_else(|| DwcError::config(format!("missing required attribute {:?}", key)))
}

fn wrong_kind(key: &str, expected: &str, got: &AttrValue) -> DwcError {
    DwcError::config(format!(
        "attribute {:?} must be {}, got {}",
        key,
        expected,
        got.kind()
    ))
}

fn required_int(table: &AttributeTable, key: &str) -> Result<i64> {
    match lookup(table, key)? {
        AttrValue::Int(v) => Ok(*v),
        other => Err(wrong_kind(key, "int", other)),
    }
}

fn required_ints<'a>(table: &'a AttributeTable, key: &str) -> Result<&'a [i64]> {
    match lookup(table, key)? {
        AttrValue::Ints(v) => Ok(v),
        other => Err(wrong_kind(key, "ints", other)),
    }
}

fn required_str<'a>(table: &'a AttributeTable, key: &str) -> Result<&'a str> {
    match lookup(table, key)? {
        AttrValue::Str(v) => Ok(v),
        other => Err(wrong_kind(key, "string", other)),
    }
}

fn optional_str(table: &AttributeTable, key: &str) -> Result<Option<String>> {
    match table.get(key) {
        None => Ok(None),
        Some(AttrValue::Str(v)) => Ok(Some(v.clone())),
        Some(other) => Err(wrong_kind(key, "string", other)),
    }
}

fn positive(key: &str, value: i64) -> Result<u32> {
    if value <= 0 || value > u32::MAX as i64 {
        return Err(DwcError::config(format!(
            "attribute {:?} must be a positive integer, got {}",
            key, value
        )));
    }
    Ok(value as u32)
}
