use crate::filter::Filter;

/// Sharpens or flattens the distribution by raising each surviving
/// probability to `1 / temperature`.
///
/// On `exp(logit - max)` this is the same as dividing the logits by the
/// temperature. Temperatures of exactly 1, and the greedy range `<= 0`,
/// leave the slice untouched.
pub struct Temperature {
    temperature: f32,
}

impl Temperature {
    /// Create a new temperature filter with the given temperature.
    pub fn new(temperature: f32) -> Self {
        Self { temperature }
    }
}

impl Filter for Temperature {
    fn name(&self) -> &str {
        "temperature"
    }

    fn apply(&self, probs: &mut [f32]) {
        if self.temperature == 1.0 || self.temperature <= 0.0 {
            return;
        }
        let exponent = 1.0 / self.temperature;
        for p in probs.iter_mut() {
            if *p > 0.0 {
                *p = p.powf(exponent);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_temperature_matches_logit_scaling() {
        let logits = [1.0f32, 2.0, 3.0];
        let max = 3.0f32;
        let mut probs: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
        Temperature::new(0.5).apply(&mut probs);
        for (p, l) in probs.iter().zip(&logits) {
            assert_relative_eq!(*p, ((l - max) / 0.5).exp(), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_unit_temperature_is_identity() {
        let mut probs = [0.2f32, 0.0, 0.8];
        Temperature::new(1.0).apply(&mut probs);
        assert_eq!(probs, [0.2, 0.0, 0.8]);
    }

    #[test]
    fn test_zero_stays_zero() {
        let mut probs = [0.0f32, 0.5];
        Temperature::new(2.0).apply(&mut probs);
        assert_eq!(probs[0], 0.0);
        assert_relative_eq!(probs[1], 0.5f32.sqrt(), epsilon = 1e-7);
    }
}
