//! `ic-backend` - Capability-based backend registry and dispatch.
//!
//! Providers are fixed at compile time, one per [`Capability`]. The
//! registry picks among them using a capability snapshot taken once per
//! process, and [`Backend`] instances carry per-instance provider state.
//!
//! Two failure policies apply: creating an instance fails hard when no
//! provider can be bound, while the convenience wrappers in [`global`]
//! quietly do nothing when no default instance can be created or it lacks
//! the op.

pub mod capability;
pub mod config;
pub mod error;
pub mod global;
pub mod instance;
pub mod provider;
pub mod providers;
pub mod registry;

pub use capability::{Capability, CapabilitySnapshot};
pub use config::BackendConfig;
pub use error::{BackendError, Result};
pub use global::{
    clear_default, create, create_best, create_with, destroy, get_default, registry_count,
    set_default,
};
pub use instance::Backend;
pub use provider::{AttentionArgs, BackendDescriptor, BackendOps, Op, ProviderContext};
pub use registry::{Registry, REGISTRY_CAPACITY};
