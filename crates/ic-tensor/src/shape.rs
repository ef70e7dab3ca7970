use crate::error::{Result, TensorError};
use std::fmt;

/// An ordered list of dimension sizes, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Create a new shape from a vector of dimensions.
    pub fn new(dims: Vec<usize>) -> Self {
        Shape { dims }
    }

    /// Create a shape from a slice of dimensions.
    pub fn from_slice(dims: &[usize]) -> Self {
        Shape {
            dims: dims.to_vec(),
        }
    }

    /// Number of dimensions (rank).
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements (product of all dimension sizes).
    pub fn numel(&self) -> usize {
        self.dims.iter().product()
    }

    /// Returns the size of dimension `i`.
    ///
    /// # Panics
    /// Panics if `i >= ndim()`.
    pub fn dim(&self, i: usize) -> usize {
        self.dims[i]
    }

    /// Returns a reference to the underlying dimension sizes.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Size of the innermost dimension, or 1 for a scalar shape.
    pub fn last_dim(&self) -> usize {
        self.dims.last().copied().unwrap_or(1)
    }

    /// Interprets a rank-2 shape as `(rows, cols)`.
    pub fn as_matrix(&self) -> Result<(usize, usize)> {
        match self.dims.as_slice() {
            [rows, cols] => Ok((*rows, *cols)),
            _ => Err(TensorError::InvalidShape(format!(
                "expected a rank-2 shape, got {}",
                self
            ))),
        }
    }

    /// Number of rows when the shape is viewed as `[numel / row_len, row_len]`.
    ///
    /// Fails when `row_len` is zero or does not divide the element count.
    pub fn rows(&self, row_len: usize) -> Result<usize> {
        let n = self.numel();
        if row_len == 0 || n % row_len != 0 {
            return Err(TensorError::InvalidShape(format!(
                "{} elements of shape {} do not split into rows of {}",
                n, self, row_len
            )));
        }
        Ok(n / row_len)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::from_slice(dims)
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Shape::from_slice(&dims)
    }
}
