//! Runtime detection of the vector instruction set.
//!
//! Detection runs once per process; every later query reads the cached
//! result.

use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsaLevel {
    /// No usable vector unit; every kernel takes the portable scalar path.
    Scalar,
    /// x86-64 with AVX2 and FMA.
    Avx2,
    /// AArch64 Advanced SIMD (always present on that target).
    Neon,
}

impl IsaLevel {
    pub fn has_vector_unit(&self) -> bool {
        !matches!(self, IsaLevel::Scalar)
    }
}

static ISA_LEVEL: OnceLock<IsaLevel> = OnceLock::new();
static THREADS: OnceLock<usize> = OnceLock::new();

pub fn isa_level() -> IsaLevel {
    *ISA_LEVEL.get_or_init(|| {
        let level = detect_isa_features();
        log::debug!("detected ISA level {:?}", level);
        level
    })
}

/// True when the vectorized kernels should be preferred.
pub fn vector_enabled() -> bool {
    isa_level().has_vector_unit()
}

/// Usable hardware threads, detected once; 1 when the OS will not say.
pub fn available_threads() -> usize {
    *THREADS.get_or_init(|| {
        std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1)
    })
}

#[cfg(target_arch = "x86_64")]
fn detect_isa_features() -> IsaLevel {
    if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
        IsaLevel::Avx2
    } else {
        IsaLevel::Scalar
    }
}

#[cfg(target_arch = "aarch64")]
fn detect_isa_features() -> IsaLevel {
    IsaLevel::Neon
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
fn detect_isa_features() -> IsaLevel {
    IsaLevel::Scalar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_is_stable() {
        assert_eq!(isa_level(), isa_level());
        assert_eq!(vector_enabled(), isa_level().has_vector_unit());
    }

    #[test]
    fn test_threads_positive() {
        assert!(available_threads() >= 1);
    }

    #[test]
    fn test_scalar_has_no_vector_unit() {
        assert!(!IsaLevel::Scalar.has_vector_unit());
        assert!(IsaLevel::Neon.has_vector_unit());
    }
}
