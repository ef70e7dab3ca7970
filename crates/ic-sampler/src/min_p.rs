use crate::filter::Filter;

/// Zeroes every probability below `min_p` times the largest one.
pub struct MinP {
    min_p: f32,
}

impl MinP {
    pub fn new(min_p: f32) -> Self {
        Self { min_p }
    }
}

impl Filter for MinP {
    fn name(&self) -> &str {
        "min_p"
    }

    fn apply(&self, probs: &mut [f32]) {
        if self.min_p <= 0.0 || probs.is_empty() {
            return;
        }
        let max = probs.iter().copied().fold(0.0f32, f32::max);
        let threshold = max * self.min_p;
        for p in probs.iter_mut() {
            if *p < threshold {
                *p = 0.0;
            }
        }
    }
}
