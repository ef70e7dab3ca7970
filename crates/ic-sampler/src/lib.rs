//! `ic-sampler` - Token sampling for inference-core.
//!
//! A [`Sampler`] turns one row of logits into a token id through a fixed
//! filter pipeline ([`MinP`], [`TopK`], [`TopP`], [`Temperature`]) and a
//! single draw from a seeded [`XorShift64Star`]. The same seed, logits and
//! parameters always give the same token.

pub mod engine;
pub mod error;
pub mod filter;
pub mod greedy;
pub mod kernel;
pub mod min_p;
pub mod params;
pub mod repetition;
pub mod rng;
pub mod temperature;
pub mod top_k;
pub mod top_p;

pub use engine::{default_sampler, probability, sample, Sampler};
pub use error::{Result, SamplerError};
pub use filter::Filter;
pub use greedy::argmax;
pub use kernel::{SamplingKernel, ScalarKernel, VectorKernel};
pub use min_p::MinP;
pub use params::SamplingParams;
pub use repetition::RepetitionPenalty;
pub use rng::XorShift64Star;
pub use temperature::Temperature;
pub use top_k::TopK;
pub use top_p::TopP;
