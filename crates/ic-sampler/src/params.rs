use crate::error::{Result, SamplerError};

/// Knobs of one sampling call.
///
/// The default leaves the distribution untouched: temperature 1, top-k and
/// min-p disabled, top-p 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    /// `<= 0` selects greedy decoding; `1` leaves probabilities unscaled.
    pub temperature: f32,
    /// Keep only the `k` most probable tokens; `0` disables.
    pub top_k: usize,
    /// Nucleus mass; `>= 1` disables.
    pub top_p: f32,
    /// Drop tokens below `min_p * max_probability`; `0` disables.
    pub min_p: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_k: 0,
            top_p: 1.0,
            min_p: 0.0,
        }
    }
}

impl SamplingParams {
    /// Arg-max decoding.
    pub fn greedy() -> Self {
        Self {
            temperature: 0.0,
            ..Self::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn with_min_p(mut self, min_p: f32) -> Self {
        self.min_p = min_p;
        self
    }

    pub fn is_greedy(&self) -> bool {
        self.temperature <= 0.0
    }

    /// Rejects NaN or out-of-range values. Sampling itself never fails, so
    /// callers that take parameters from users should check them here.
    pub fn validate(&self) -> Result<()> {
        if self.temperature.is_nan() || self.temperature < 0.0 || self.temperature.is_infinite() {
            return Err(SamplerError::InvalidParameter {
                name: "temperature",
                value: self.temperature,
            });
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(SamplerError::InvalidParameter {
                name: "top_p",
                value: self.top_p,
            });
        }
        if !(0.0..=1.0).contains(&self.min_p) {
            return Err(SamplerError::InvalidParameter {
                name: "min_p",
                value: self.min_p,
            });
        }
        Ok(())
    }
}
