use std::cmp::Ordering;

use crate::filter::Filter;

/// Nucleus filter: keeps the smallest set of most probable tokens whose
/// cumulative normalized probability reaches `p`.
pub struct TopP {
    p: f32,
}

impl TopP {
    /// Create a new top-p filter; `p >= 1` disables it.
    pub fn new(p: f32) -> Self {
        Self { p }
    }
}

impl Filter for TopP {
    fn name(&self) -> &str {
        "top_p"
    }

    /// Normalizes in place, then zeroes everything outside the nucleus. The
    /// most probable token always survives, so `p <= 0` keeps exactly one.
    fn apply(&self, probs: &mut [f32]) {
        if self.p >= 1.0 || probs.is_empty() {
            return;
        }
        let sum: f32 = probs.iter().sum();
        if sum <= 0.0 {
            return;
        }
        for p in probs.iter_mut() {
            *p /= sum;
        }

        // Sort candidate indices descending by probability; ties keep index order.
        let mut order: Vec<usize> = (0..probs.len()).filter(|&i| probs[i] > 0.0).collect();
        order.sort_by(|&a, &b| probs[b].partial_cmp(&probs[a]).unwrap_or(Ordering::Equal));

        let mut cumulative = 0.0f32;
        let mut cutoff = order.len();
        for (rank, &i) in order.iter().enumerate() {
            cumulative += probs[i];
            if cumulative >= self.p {
                cutoff = rank + 1;
                break;
            }
        }

        for &i in &order[cutoff..] {
            probs[i] = 0.0;
        }
    }
}
