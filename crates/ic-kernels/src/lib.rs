//! `ic-kernels` - CPU compute kernels for inference-core.
//!
//! Every kernel here is a leaf: it borrows caller-owned buffers, asserts
//! their lengths once at entry, and never reports errors from inside its
//! loops. Scratch memory is allocated and released within a single call.
//!
//! - [`attention`]: streaming (flash) attention, scalar and vectorized
//! - [`gemm`]: tiled matrix multiply on the matrix-unit state machine
//! - [`elementwise`]: rms-norm, SiLU and row softmax
//! - [`matmul`]: reference and vectorized plain matmul
//! - [`isa`]: one-time CPU feature detection

pub mod attention;
pub mod elementwise;
pub mod gemm;
pub mod isa;
pub mod matmul;
pub mod vector;

mod scratch;

pub use attention::{
    attention_bf16, attention_f16, attention_f32, multi_head_attention, AttentionPath,
    AttentionShape,
};
pub use gemm::{gemm_bf16, gemm_bf16_mt, gemm_f16, gemm_f16_mt};
pub use isa::{available_threads, isa_level, vector_enabled, IsaLevel};
