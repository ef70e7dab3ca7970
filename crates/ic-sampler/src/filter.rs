/// One stage of the probability pipeline.
///
/// Filters work in place on unnormalized probabilities (`exp(logit - max)`)
/// and signal removal by writing zero. A filter whose setting is disabled
/// leaves the slice untouched.
pub trait Filter: Send + Sync {
    /// Returns the name of this filter.
    fn name(&self) -> &str;

    fn apply(&self, probs: &mut [f32]);
}
