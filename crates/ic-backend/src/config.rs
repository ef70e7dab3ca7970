use ic_tensor::DType;

use crate::capability::CapabilitySnapshot;
use crate::error::{BackendError, Result};

/// Per-instance settings passed to [`crate::Backend::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendConfig {
    /// Worker threads for parallel kernels; `None` uses the detected count.
    pub threads: Option<usize>,
    /// Element type the caller intends to run in.
    pub preferred_dtype: DType,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            threads: None,
            preferred_dtype: DType::F32,
        }
    }
}

impl BackendConfig {
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.preferred_dtype = dtype;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.threads == Some(0) {
            return Err(BackendError::InvalidConfig(
                "thread count must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn resolve_threads(&self, snapshot: &CapabilitySnapshot) -> usize {
        self.threads.unwrap_or_else(|| snapshot.threads())
    }
}
