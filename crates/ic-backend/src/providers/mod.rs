//! Built-in providers, one per capability.

mod scalar;
mod tile;
mod vector;

pub use scalar::{ScalarOps, SCALAR};
pub use tile::{MatrixTileOps, MATRIX_TILE};
pub use vector::{VectorOps, VECTOR};

use crate::provider::BackendDescriptor;

/// Built-in descriptors in registration order.
pub static BUILTINS: [&BackendDescriptor; 3] = [&SCALAR, &VECTOR, &MATRIX_TILE];
