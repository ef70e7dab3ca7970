use std::sync::OnceLock;

use rand::RngCore;

use crate::filter::Filter;
use crate::greedy::argmax;
use crate::kernel::{SamplingKernel, SCALAR_KERNEL, VECTOR_KERNEL};
use crate::min_p::MinP;
use crate::params::SamplingParams;
use crate::rng::unit_f32;
use crate::temperature::Temperature;
use crate::top_k::TopK;
use crate::top_p::TopP;

/// Runs the sampling pipeline on one arithmetic kernel.
///
/// Pipeline, in order, on a working copy `exp(logit - max_logit)`:
/// min-p, top-k, top-p, temperature, normalize, then one draw walking the
/// cumulative distribution. A temperature `<= 0` skips all of it and
/// returns the arg-max of the raw logits.
#[derive(Clone, Copy)]
pub struct Sampler {
    kernel: &'static dyn SamplingKernel,
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("kernel", &self.kernel.name())
            .finish()
    }
}

impl Sampler {
    pub fn new(kernel: &'static dyn SamplingKernel) -> Self {
        Self { kernel }
    }

    pub fn scalar() -> Self {
        Self::new(&SCALAR_KERNEL)
    }

    pub fn vectorized() -> Self {
        Self::new(&VECTOR_KERNEL)
    }

    /// The vector kernel when the CPU has a vector unit, scalar otherwise.
    pub fn detect() -> Self {
        let sampler = if ic_kernels::vector_enabled() {
            Self::vectorized()
        } else {
            Self::scalar()
        };
        log::debug!("sampler using {} kernel", sampler.kernel.name());
        sampler
    }

    pub fn kernel_name(&self) -> &'static str {
        self.kernel.name()
    }

    /// The normalized distribution the draw step walks, after every filter.
    /// All zeros when filtering removed everything.
    pub fn distribution(&self, logits: &[f32], params: &SamplingParams) -> Vec<f32> {
        let mut probs = vec![0.0f32; logits.len()];
        if logits.is_empty() {
            return probs;
        }
        let max = self.kernel.max(logits);
        self.kernel.exp_shifted(logits, max, &mut probs);

        let stages: [&dyn Filter; 4] = [
            &MinP::new(params.min_p),
            &TopK::new(params.top_k),
            &TopP::new(params.top_p),
            &Temperature::new(params.temperature),
        ];
        for stage in stages {
            stage.apply(&mut probs);
            if log::log_enabled!(log::Level::Trace) {
                let kept = probs.iter().filter(|&&p| p > 0.0).count();
                log::trace!("{}: {} of {} tokens kept", stage.name(), kept, probs.len());
            }
        }
        self.kernel.normalize(&mut probs);
        probs
    }

    /// Samples one token id from `logits` (one entry per vocabulary id).
    ///
    /// Consumes exactly one `next_u32` from `rng` unless decoding is greedy.
    /// An empty slice yields token 0.
    pub fn sample<R: RngCore + ?Sized>(
        &self,
        logits: &[f32],
        params: &SamplingParams,
        rng: &mut R,
    ) -> u32 {
        if logits.is_empty() {
            return 0;
        }
        if params.is_greedy() {
            return argmax(logits);
        }

        let probs = self.distribution(logits, params);
        let r = unit_f32(rng.next_u32());
        let mut cumulative = 0.0f32;
        for (i, &p) in probs.iter().enumerate() {
            cumulative += p;
            if r < cumulative {
                return i as u32;
            }
        }
        (probs.len() - 1) as u32
    }

    /// Softmax probability of `token` over the full, unfiltered logits.
    /// Returns 0.0 for an out-of-range token or empty logits.
    pub fn probability(&self, logits: &[f32], token: u32) -> f32 {
        let Some(&logit) = logits.get(token as usize) else {
            return 0.0;
        };
        let max = self.kernel.max(logits);
        let sum = self.kernel.sum_exp(logits, max);
        if sum > 0.0 {
            (logit - max).exp() / sum
        } else {
            0.0
        }
    }
}

static DEFAULT_SAMPLER: OnceLock<Sampler> = OnceLock::new();

/// The process-wide sampler, detected on first use.
pub fn default_sampler() -> Sampler {
    *DEFAULT_SAMPLER.get_or_init(Sampler::detect)
}

/// [`Sampler::sample`] on the process-wide sampler.
pub fn sample<R: RngCore + ?Sized>(logits: &[f32], params: &SamplingParams, rng: &mut R) -> u32 {
    default_sampler().sample(logits, params, rng)
}

/// [`Sampler::probability`] on the process-wide sampler.
pub fn probability(logits: &[f32], token: u32) -> f32 {
    default_sampler().probability(logits, token)
}
