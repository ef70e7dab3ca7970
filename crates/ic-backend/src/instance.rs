//! A backend instance: a descriptor bound to per-instance provider state.

use ic_tensor::{DType, TensorView, TensorViewMut};

use crate::capability::{Capability, CapabilitySnapshot};
use crate::config::BackendConfig;
use crate::error::{BackendError, Result};
use crate::provider::{AttentionArgs, BackendDescriptor, Op, ProviderContext};

/// A live backend. Dropping it runs the provider's destroy hook.
#[derive(Debug)]
pub struct Backend {
    descriptor: &'static BackendDescriptor,
    dtype: DType,
    context: ProviderContext,
}

impl Backend {
    /// Binds `descriptor` and runs its init hook.
    pub fn new(
        descriptor: &'static BackendDescriptor,
        config: &BackendConfig,
        snapshot: &CapabilitySnapshot,
    ) -> Result<Self> {
        config.validate()?;
        let threads = config.resolve_threads(snapshot);
        let context = descriptor.ops.init(threads)?;
        log::debug!(
            "backend '{}' created: {} threads, {}",
            descriptor.name,
            context.threads(),
            config.preferred_dtype
        );
        Ok(Self {
            descriptor,
            dtype: config.preferred_dtype,
            context,
        })
    }

    pub fn descriptor(&self) -> &'static BackendDescriptor {
        self.descriptor
    }

    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    pub fn capability(&self) -> Capability {
        self.descriptor.capability
    }

    /// Element type the instance was created for.
    pub fn preferred_dtype(&self) -> DType {
        self.dtype
    }

    pub fn threads(&self) -> usize {
        self.context.threads()
    }

    /// Changes the worker thread count; zero is clamped to one.
    pub fn set_threads(&self, threads: usize) {
        self.context.set_threads(threads);
    }

    pub fn supports(&self, op: Op) -> bool {
        self.descriptor.supports(op)
    }

    fn require(&self, op: Op) -> Result<()> {
        if self.supports(op) {
            Ok(())
        } else {
            Err(BackendError::Unsupported {
                backend: self.descriptor.name,
                op,
            })
        }
    }

    /// `c = a @ b` for rank-2 views.
    pub fn matmul(
        &self,
        a: &TensorView<'_>,
        b: &TensorView<'_>,
        c: &mut TensorViewMut<'_>,
    ) -> Result<()> {
        self.require(Op::Matmul)?;
        self.descriptor.ops.matmul(&self.context, a, b, c)
    }

    pub fn rms_norm(
        &self,
        x: &TensorView<'_>,
        weight: &TensorView<'_>,
        eps: f32,
        out: &mut TensorViewMut<'_>,
    ) -> Result<()> {
        self.require(Op::RmsNorm)?;
        self.descriptor.ops.rms_norm(&self.context, x, weight, eps, out)
    }

    pub fn silu(&self, x: &TensorView<'_>, out: &mut TensorViewMut<'_>) -> Result<()> {
        self.require(Op::Silu)?;
        self.descriptor.ops.silu(&self.context, x, out)
    }

    pub fn softmax(&self, x: &TensorView<'_>, out: &mut TensorViewMut<'_>) -> Result<()> {
        self.require(Op::Softmax)?;
        self.descriptor.ops.softmax(&self.context, x, out)
    }

    /// Batched multi-head attention using the instance's thread count.
    pub fn attention(&self, args: &AttentionArgs<'_>, out: &mut TensorViewMut<'_>) -> Result<()> {
        self.require(Op::Attention)?;
        self.descriptor.ops.attention(&self.context, args, out)
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        log::debug!("backend '{}' destroyed", self.descriptor.name);
        self.descriptor.ops.destroy(&mut self.context);
    }
}
