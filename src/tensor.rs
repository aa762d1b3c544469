//! Row-major tensors and the execution context they live in.

use std::collections::HashMap;

use crate::datatype::DataType;
use crate::error::{DwcError, Result};
use crate::shape::Shape;

/// A dense row-major tensor of `f32` values annotated with a logical datatype.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Shape,
    data: Vec<f32>,
    datatype: DataType,
}

impl Tensor {
    /// Create a tensor, checking that `data` fills `shape` exactly.
    pub fn new(shape: impl Into<Shape>, data: Vec<f32>, datatype: DataType) -> Result<Self> {
        let shape = shape.into();
        if shape.elem_count() != data.len() {
            return Err(DwcError::validation(format!(
                "shape {} requires {} elements, got {}",
                shape,
                shape.elem_count(),
                data.len()
            )));
        }
        Ok(Self { shape, data, datatype })
    }

    /// Tensor of the given shape filled with zeros.
    pub fn zeros(shape: impl Into<Shape>, datatype: DataType) -> Self {
        let shape = shape.into();
        let data = vec![0.0; shape.elem_count()];
        Self { shape, data, datatype }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn datatype(&self) -> DataType {
        self.datatype
    }

    /// View the same values under a different shape with the same element count.
    pub fn reshape(self, shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        if shape.elem_count() != self.data.len() {
            return Err(DwcError::validation(format!(
                "cannot reshape {} ({} elements) into {}",
                self.shape,
                self.data.len(),
                shape
            )));
        }
        Ok(Self { shape, ..self })
    }

    /// Apply `f` elementwise and relabel the datatype.
    pub fn map(self, datatype: DataType, f: impl Fn(f32) -> f32) -> Self {
        let data = self.data.into_iter().map(f).collect();
        Self { shape: self.shape, data, datatype }
    }

    /// First element not allowed by the tensor's datatype, with its index.
    pub fn first_disallowed(&self) -> Option<(usize, f32)> {
        self.data
            .iter()
            .copied()
            .enumerate()
            .find(|(_, v)| !self.datatype.allowed(*v))
    }
}

/// Tensor storage shared between the nodes of a graph during execution.
///
/// A node reads exactly its declared input and writes exactly its declared
/// output; it holds no reference into the context after a call returns.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    tensors: HashMap<String, Tensor>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a tensor.
    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) {
        self.tensors.insert(name.into(), tensor);
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Tensor> {
        self.tensors.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_element_count() {
        assert!(Tensor::new([1, 4], vec![0.0; 4], DataType::Binary).is_ok());
        let err = Tensor::new([1, 4], vec![0.0; 3], DataType::Binary).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_reshape_keeps_values() {
        let t = Tensor::new([2, 4], (0..8).map(|v| v as f32).collect(), DataType::UInt(4)).unwrap();
        let r = t.clone().reshape([2, 2, 2]).unwrap();
        assert_eq!(r.shape().dims(), &[2, 2, 2]);
        assert_eq!(r.data(), t.data());
        assert!(t.reshape([3, 3]).is_err());
    }

    #[test]
    fn test_first_disallowed() {
        let t = Tensor::new([1, 3], vec![1.0, -1.0, 0.0], DataType::Bipolar).unwrap();
        assert_eq!(t.first_disallowed(), Some((2, 0.0)));
    }

    #[test]
    fn test_context_roundtrip() {
        let mut ctx = ExecutionContext::new();
        ctx.insert("a", Tensor::zeros([2], DataType::Binary));
        assert!(ctx.contains("a"));
        assert_eq!(ctx.len(), 1);
        assert!(ctx.remove("a").is_some());
        assert!(ctx.is_empty());
    }
}
