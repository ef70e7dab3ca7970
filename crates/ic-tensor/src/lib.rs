//! `ic-tensor` - Tensor views and numeric formats for inference-core.
//!
//! This crate provides:
//! - Non-owning `TensorView` / `TensorViewMut` types (typed slice + shape)
//! - Bit-level conversion between f32 and the 16-bit formats (f16, bf16)
//! - The `Element` trait the compute kernels are generic over
//! - Shape utilities and data type definitions

pub mod convert;
pub mod dtype;
pub mod element;
pub mod error;
pub mod shape;
pub mod view;

// Re-export primary types at the crate root for convenience.
pub use dtype::DType;
pub use element::Element;
pub use error::{Result, TensorError};
pub use half::{bf16, f16};
pub use shape::Shape;
pub use view::{TensorData, TensorDataMut, TensorView, TensorViewMut, ViewElement};
