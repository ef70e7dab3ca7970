/// Allocates a scratch buffer without aborting on allocation failure.
///
/// Returns `None` (after logging) when the allocator refuses; callers turn
/// that into a no-op or a zeroed output instead of touching the buffer.
pub(crate) fn try_filled<T: Copy>(len: usize, fill: T) -> Option<Vec<T>> {
    let mut buf = Vec::new();
    if buf.try_reserve_exact(len).is_err() {
        log::warn!(
            "scratch allocation of {} x {} bytes failed",
            len,
            std::mem::size_of::<T>()
        );
        return None;
    }
    buf.resize(len, fill);
    Some(buf)
}
