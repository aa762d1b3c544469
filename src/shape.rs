//! Tensor shapes.
//!
//! Shapes in this crate are short (a batch dim, maybe spatial dims, then the
//! channel count, plus one extra dim once folded), so dimensions live inline
//! in a `SmallVec` and only spill to the heap for unusually deep tensors.

use std::fmt;

use smallvec::SmallVec;

/// Inline storage for dimension sizes.
pub type Dims = SmallVec<[usize; 6]>;

/// N-dimensional shape of a tensor, outermost dimension first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape(Dims);

impl Shape {
    /// Create a shape from dimension sizes.
    pub fn new(dims: &[usize]) -> Self {
        Shape(dims.iter().copied().collect())
    }

    /// The dimension sizes as a slice.
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Total number of elements (product of all dimensions).
    ///
    /// An empty shape has no elements here: unlike a general tensor library
    /// there is no scalar stream, so rank 0 is treated as degenerate.
    /// Saturates at `usize::MAX`; use [`checked_elem_count`](Self::checked_elem_count)
    /// to detect overflow.
    pub fn elem_count(&self) -> usize {
        if self.0.is_empty() {
            0
        } else {
            self.0.iter().fold(1usize, |acc, &d| acc.saturating_mul(d))
        }
    }

    /// Element count, or `None` if the product overflows `usize`.
    pub fn checked_elem_count(&self) -> Option<usize> {
        if self.0.is_empty() {
            return Some(0);
        }
        self.0.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// Innermost dimension (the channel count for a normal shape).
    pub fn last_dim(&self) -> Option<usize> {
        self.0.last().copied()
    }

    /// Everything but the innermost dimension.
    pub fn outer_dims(&self) -> &[usize] {
        match self.0.split_last() {
            Some((_, outer)) => outer,
            None => &[],
        }
    }

    /// Product of all dimensions except the innermost one.
    pub fn outer_count(&self) -> usize {
        self.outer_dims().iter().fold(1usize, |acc, &d| acc.saturating_mul(d))
    }

    /// Replace the innermost dimension by `[last / split, split]`.
    ///
    /// The caller must have checked divisibility.
    pub(crate) fn split_last(&self, split: usize) -> Shape {
        let last = self.0[self.0.len() - 1];
        let mut dims: Dims = self.outer_dims().iter().copied().collect();
        dims.push(last / split);
        dims.push(split);
        Shape(dims)
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape(dims.into_iter().collect())
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::new(dims)
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Shape::new(&dims)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elem_count() {
        assert_eq!(Shape::from([1, 4]).elem_count(), 4);
        assert_eq!(Shape::from([2, 3, 8]).elem_count(), 48);
        assert_eq!(Shape::default().elem_count(), 0);
    }

    #[test]
    fn test_elem_count_overflow() {
        let big = u32::MAX as usize;
        let s = Shape::from([big, big, big]);
        assert_eq!(s.checked_elem_count(), None);
        assert_eq!(s.elem_count(), usize::MAX);
        assert_eq!(Shape::from([2, 3]).checked_elem_count(), Some(6));
        assert_eq!(Shape::default().checked_elem_count(), Some(0));
    }

    #[test]
    fn test_outer_dims() {
        let s = Shape::from([2, 5, 16]);
        assert_eq!(s.outer_dims(), &[2, 5]);
        assert_eq!(s.outer_count(), 10);
        assert_eq!(s.last_dim(), Some(16));
    }

    #[test]
    fn test_split_last() {
        let s = Shape::from([1, 3, 12]).split_last(4);
        assert_eq!(s.dims(), &[1, 3, 3, 4]);
    }

    #[test]
    fn test_display() {
        assert_eq!(Shape::from([1, 4, 1]).to_string(), "[1, 4, 1]");
    }
}
