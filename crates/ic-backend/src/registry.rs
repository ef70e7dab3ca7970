//! Bounded table of registered backend descriptors.

use std::ptr;

use crate::capability::{Capability, CapabilitySnapshot};
use crate::error::{BackendError, Result};
use crate::providers::BUILTINS;
use crate::provider::BackendDescriptor;

/// Maximum number of descriptors a registry holds.
pub const REGISTRY_CAPACITY: usize = 8;

/// Descriptors in registration order.
#[derive(Debug, Clone)]
pub struct Registry {
    entries: [Option<&'static BackendDescriptor>; REGISTRY_CAPACITY],
    len: usize,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            entries: [None; REGISTRY_CAPACITY],
            len: 0,
        }
    }

    /// A registry holding the scalar, vector and matrix-tile providers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for desc in BUILTINS {
            let registered = registry.register(desc);
            debug_assert!(registered.is_ok(), "built-in backends exceed the registry capacity");
            if let Err(err) = registered {
                log::error!("built-in backend '{}' not registered: {}", desc.name, err);
            }
        }
        registry
    }

    /// Adds `desc`. Registering the same descriptor, or one whose name is
    /// already taken, is a successful no-op.
    pub fn register(&mut self, desc: &'static BackendDescriptor) -> Result<()> {
        if self
            .iter()
            .any(|d| ptr::eq(d, desc) || d.name == desc.name)
        {
            log::debug!("backend '{}' already registered", desc.name);
            return Ok(());
        }
        if self.len == REGISTRY_CAPACITY {
            return Err(BackendError::RegistryFull {
                capacity: REGISTRY_CAPACITY,
            });
        }
        self.entries[self.len] = Some(desc);
        self.len += 1;
        log::debug!("registered backend '{}' ({})", desc.name, desc.capability);
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.len
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static BackendDescriptor> + '_ {
        self.entries[..self.len].iter().flatten().copied()
    }

    /// First registered descriptor with capability `cap`.
    pub fn get_by_capability(&self, cap: Capability) -> Option<&'static BackendDescriptor> {
        self.iter().find(|d| d.capability == cap)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&'static BackendDescriptor> {
        self.iter().find(|d| d.name == name)
    }

    /// The available descriptor with the highest priority in `snapshot`.
    /// Ties keep the earlier registration.
    pub fn best_available(&self, snapshot: &CapabilitySnapshot) -> Option<&'static BackendDescriptor> {
        let mut best: Option<&'static BackendDescriptor> = None;
        for desc in self.iter() {
            if !snapshot.is_available(desc.capability) {
                continue;
            }
            match best {
                Some(b) if snapshot.priority(desc.capability) <= snapshot.priority(b.capability) => {}
                _ => best = Some(desc),
            }
        }
        best
    }

    /// Resolves the descriptor a new instance binds to: the preferred
    /// capability if available, else the best available, else scalar.
    pub fn select(
        &self,
        preferred: Option<Capability>,
        snapshot: &CapabilitySnapshot,
    ) -> Option<&'static BackendDescriptor> {
        if let Some(cap) = preferred {
            if snapshot.is_available(cap) {
                if let Some(desc) = self.get_by_capability(cap) {
                    return Some(desc);
                }
            }
        }
        let chosen = self
            .best_available(snapshot)
            .or_else(|| self.get_by_capability(Capability::Scalar));
        if let (Some(cap), Some(desc)) = (preferred, chosen) {
            log::warn!(
                "backend '{}' unavailable, falling back to '{}'",
                cap,
                desc.name
            );
        }
        chosen
    }
}
