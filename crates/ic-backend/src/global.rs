//! Process-wide registry, capability snapshot and default instance.
//!
//! The registry is created with the built-in providers on first use, and
//! the default instance on the first [`get_default`] or wrapper call.
//! Registration is meant to happen during single-threaded startup; lookups
//! and dispatch may run concurrently afterwards.

use std::sync::{Arc, OnceLock};

use ic_tensor::{TensorView, TensorViewMut};
use parking_lot::{Mutex, RwLock};

use crate::capability::{Capability, CapabilitySnapshot};
use crate::config::BackendConfig;
use crate::error::{BackendError, Result};
use crate::instance::Backend;
use crate::provider::{BackendDescriptor, Op};
use crate::registry::Registry;

struct GlobalState {
    registry: RwLock<Registry>,
    default: Mutex<Option<Arc<Backend>>>,
    capabilities: RwLock<Option<CapabilitySnapshot>>,
}

static STATE: OnceLock<GlobalState> = OnceLock::new();

fn state() -> &'static GlobalState {
    STATE.get_or_init(|| GlobalState {
        registry: RwLock::new(Registry::with_builtins()),
        default: Mutex::new(None),
        capabilities: RwLock::new(None),
    })
}

/// The snapshot used for selection: the override if one is set, otherwise
/// the detected one.
pub fn capabilities() -> CapabilitySnapshot {
    match *state().capabilities.read() {
        Some(snapshot) => snapshot,
        None => *CapabilitySnapshot::global(),
    }
}

/// Replaces the snapshot used for selection; `None` restores detection.
/// Lets tests exercise fallback paths on any host.
pub fn override_capabilities(snapshot: Option<CapabilitySnapshot>) {
    *state().capabilities.write() = snapshot;
}

pub fn register(desc: &'static BackendDescriptor) -> Result<()> {
    state().registry.write().register(desc)
}

pub fn registry_count() -> usize {
    state().registry.read().count()
}

pub fn get_by_capability(cap: Capability) -> Option<&'static BackendDescriptor> {
    state().registry.read().get_by_capability(cap)
}

pub fn get_by_name(name: &str) -> Option<&'static BackendDescriptor> {
    state().registry.read().get_by_name(name)
}

/// Creates an instance with default settings.
///
/// A preferred capability that is unavailable or unregistered falls back to
/// the best available provider, then to scalar. Fails with
/// [`BackendError::NoBackend`] only if none of those is registered.
pub fn create(preferred: Option<Capability>) -> Result<Backend> {
    create_with(preferred, &BackendConfig::default())
}

pub fn create_with(preferred: Option<Capability>, config: &BackendConfig) -> Result<Backend> {
    let snapshot = capabilities();
    let desc = state()
        .registry
        .read()
        .select(preferred, &snapshot)
        .ok_or(BackendError::NoBackend)?;
    Backend::new(desc, config, &snapshot)
}

/// Creates an instance on the highest-priority available provider.
pub fn create_best() -> Result<Backend> {
    create(None)
}

/// Releases an instance. Equivalent to dropping it.
pub fn destroy(backend: Backend) {
    drop(backend);
}

/// The default instance, created on the best available provider when the
/// slot is empty. `None` only if no provider can be bound.
pub fn get_default() -> Option<Arc<Backend>> {
    let mut slot = state().default.lock();
    if slot.is_none() {
        match create_best() {
            Ok(backend) => {
                log::debug!("default backend '{}' created", backend.name());
                *slot = Some(Arc::new(backend));
            }
            Err(err) => log::warn!("no default backend: {}", err),
        }
    }
    slot.clone()
}

/// Installs `backend` as the default and returns a handle to it. The
/// previous default is released once its last handle drops.
pub fn set_default(backend: Backend) -> Arc<Backend> {
    let backend = Arc::new(backend);
    let previous = state().default.lock().replace(Arc::clone(&backend));
    if let Some(previous) = previous {
        log::debug!(
            "default backend '{}' replaced by '{}'",
            previous.name(),
            backend.name()
        );
    }
    backend
}

/// Empties the default slot. The next [`get_default`] creates a fresh one.
pub fn clear_default() -> Option<Arc<Backend>> {
    state().default.lock().take()
}

/// Default instance if it supports `op`.
fn default_for(op: Op) -> Option<Arc<Backend>> {
    let backend = get_default()?;
    if !backend.supports(op) {
        log::trace!("default backend '{}' lacks {}", backend.name(), op);
        return None;
    }
    Some(backend)
}

/// Maps an op result to the wrappers' return value: a provider that turns
/// out not to implement the op is a no-op, not an error.
fn soft(result: Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(BackendError::Unsupported { backend, op }) => {
            log::trace!("{} backend does not implement {}", backend, op);
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

/// Runs `c = a @ b` on the default instance.
///
/// Returns `Ok(false)` without touching `c` when no default can be created
/// or it does not implement matmul. Invalid views are still errors.
pub fn matmul(a: &TensorView<'_>, b: &TensorView<'_>, c: &mut TensorViewMut<'_>) -> Result<bool> {
    let Some(backend) = default_for(Op::Matmul) else {
        return Ok(false);
    };
    soft(backend.matmul(a, b, c))
}

/// RMS norm on the default instance; see [`matmul`] for the return value.
pub fn rms_norm(
    x: &TensorView<'_>,
    weight: &TensorView<'_>,
    eps: f32,
    out: &mut TensorViewMut<'_>,
) -> Result<bool> {
    let Some(backend) = default_for(Op::RmsNorm) else {
        return Ok(false);
    };
    soft(backend.rms_norm(x, weight, eps, out))
}

pub fn silu(x: &TensorView<'_>, out: &mut TensorViewMut<'_>) -> Result<bool> {
    let Some(backend) = default_for(Op::Silu) else {
        return Ok(false);
    };
    soft(backend.silu(x, out))
}

pub fn softmax(x: &TensorView<'_>, out: &mut TensorViewMut<'_>) -> Result<bool> {
    let Some(backend) = default_for(Op::Softmax) else {
        return Ok(false);
    };
    soft(backend.softmax(x, out))
}
