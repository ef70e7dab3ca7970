//! Capability tags and the one-time system capability snapshot.

use std::fmt;
use std::sync::OnceLock;

/// Hardware class a backend needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Portable code; always available.
    Scalar,
    /// Eight-lane f32 vector unit (AVX2+FMA or NEON).
    Vector,
    /// Matrix unit with tile registers and an outer-product accumulator.
    MatrixTile,
}

impl Capability {
    pub const ALL: [Capability; 3] = [Capability::Scalar, Capability::Vector, Capability::MatrixTile];

    /// Stable string tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Capability::Scalar => "scalar",
            Capability::Vector => "vector",
            Capability::MatrixTile => "matrix-tile",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.tag() == tag)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// The matrix-tile unit is a software model and is slower than the vector
// kernels; it still ranks first so the tiled GEMM path is what gets selected.
const SCALAR_PRIORITY: u32 = 0;
const VECTOR_PRIORITY: u32 = 10;
const MATRIX_TILE_PRIORITY: u32 = 20;

/// Which capabilities this process may use, how they rank, and how many
/// worker threads a backend gets by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilitySnapshot {
    available: [bool; 3],
    priority: [u32; 3],
    threads: usize,
}

static SNAPSHOT: OnceLock<CapabilitySnapshot> = OnceLock::new();

impl CapabilitySnapshot {
    /// Probes the CPU. The matrix-tile unit is emulated on the vector unit,
    /// so it is available exactly when the vector capability is.
    pub fn detect() -> Self {
        let vector = ic_kernels::vector_enabled();
        Self {
            available: [true, vector, vector],
            priority: [SCALAR_PRIORITY, VECTOR_PRIORITY, MATRIX_TILE_PRIORITY],
            threads: ic_kernels::available_threads(),
        }
    }

    /// The process-wide snapshot, detected on first call.
    pub fn global() -> &'static CapabilitySnapshot {
        SNAPSHOT.get_or_init(|| {
            let snapshot = Self::detect();
            log::info!(
                "capabilities: isa {:?}, vector {}, matrix-tile {}, {} threads",
                ic_kernels::isa_level(),
                snapshot.is_available(Capability::Vector),
                snapshot.is_available(Capability::MatrixTile),
                snapshot.threads
            );
            snapshot
        })
    }

    /// Only the scalar capability.
    pub fn scalar_only(threads: usize) -> Self {
        Self {
            available: [true, false, false],
            priority: [SCALAR_PRIORITY, VECTOR_PRIORITY, MATRIX_TILE_PRIORITY],
            threads: threads.max(1),
        }
    }

    /// Copy with `cap` marked available or not, ranked at `priority`.
    pub fn with(mut self, cap: Capability, available: bool, priority: u32) -> Self {
        self.available[cap.index()] = available;
        self.priority[cap.index()] = priority;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn is_available(&self, cap: Capability) -> bool {
        self.available[cap.index()]
    }

    pub fn priority(&self, cap: Capability) -> u32 {
        self.priority[cap.index()]
    }

    pub fn threads(&self) -> usize {
        self.threads
    }
}
