use crate::filter::Filter;

/// Keeps only the K highest probabilities, zeroing the rest.
pub struct TopK {
    k: usize,
}

impl TopK {
    /// Create a new top-K filter; `k == 0` disables it.
    pub fn new(k: usize) -> Self {
        Self { k }
    }
}

impl Filter for TopK {
    fn name(&self) -> &str {
        "top_k"
    }

    /// Selection by repeated maximum search, O(k * n). Among equal
    /// probabilities the lower index is kept first.
    fn apply(&self, probs: &mut [f32]) {
        if self.k == 0 || self.k >= probs.len() {
            return;
        }

        let mut keep = vec![false; probs.len()];
        for _ in 0..self.k {
            let mut best: Option<usize> = None;
            for (i, &p) in probs.iter().enumerate() {
                if keep[i] {
                    continue;
                }
                match best {
                    Some(b) if p <= probs[b] => {}
                    _ => best = Some(i),
                }
            }
            match best {
                Some(b) => keep[b] = true,
                None => break,
            }
        }

        for (p, kept) in probs.iter_mut().zip(&keep) {
            if !kept {
                *p = 0.0;
            }
        }
    }
}
