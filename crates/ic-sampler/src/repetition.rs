use std::collections::VecDeque;

/// Applies a repetition penalty to tokens that have appeared recently.
///
/// For tokens found in the history window:
/// - Positive logits are divided by `penalty`.
/// - Negative logits are multiplied by `penalty`.
///
/// Runs on raw logits, so callers apply it before [`crate::sample`].
#[derive(Debug, Clone)]
pub struct RepetitionPenalty {
    penalty: f32,
    recent_tokens: VecDeque<u32>,
    max_history: usize,
}

impl RepetitionPenalty {
    /// - `penalty`: the penalty factor (1.0 = no penalty).
    /// - `max_history`: maximum number of recent tokens to track.
    pub fn new(penalty: f32, max_history: usize) -> Self {
        Self {
            penalty,
            recent_tokens: VecDeque::with_capacity(max_history),
            max_history,
        }
    }

    /// Record a generated token so it will be penalized in future steps.
    pub fn add_token(&mut self, token: u32) {
        if self.max_history == 0 {
            return;
        }
        if self.recent_tokens.len() == self.max_history {
            self.recent_tokens.pop_front();
        }
        self.recent_tokens.push_back(token);
    }

    pub fn history(&self) -> impl Iterator<Item = u32> + '_ {
        self.recent_tokens.iter().copied()
    }

    pub fn reset(&mut self) {
        self.recent_tokens.clear();
    }

    /// Penalizes each distinct remembered token once. Ids past the end of
    /// `logits` are ignored.
    pub fn apply(&self, logits: &mut [f32]) {
        let mut seen: Vec<u32> = self.recent_tokens.iter().copied().collect();
        seen.sort_unstable();
        seen.dedup();
        for token in seen {
            if let Some(logit) = logits.get_mut(token as usize) {
                if *logit > 0.0 {
                    *logit /= self.penalty;
                } else {
                    *logit *= self.penalty;
                }
            }
        }
    }
}
