// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Swappable handle to the current session's device objects
//!
//! The supervisor installs a fresh [`ActiveDevice`] on every connection and
//! clears it on loss. Everyone else goes through [`DeviceHandle::current`]
//! for each operation instead of keeping a facade around, because a facade
//! from a previous session sits on a closed register link.

use b5dc_device::{DeviceFacade, RegisterLink};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Device objects of one session
#[derive(Clone)]
pub struct ActiveDevice {
    pub facade: Arc<dyn DeviceFacade>,
    pub link: Arc<dyn RegisterLink>,
    /// Increases with every installed session
    pub generation: u64,
}

#[derive(Default)]
pub struct DeviceHandle {
    active: RwLock<Option<ActiveDevice>>,
    generations: AtomicU64,
}

impl DeviceHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a new session's objects current; sets facade-ready
    pub fn install(
        &self,
        facade: Arc<dyn DeviceFacade>,
        link: Arc<dyn RegisterLink>,
    ) -> ActiveDevice {
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let active = ActiveDevice {
            facade,
            link,
            generation,
        };
        *self.active.write() = Some(active.clone());
        active
    }

    /// Drop the current session's objects; clears facade-ready
    ///
    /// Waits for any in-progress [`DeviceHandle::publish_if_current`].
    pub fn clear(&self) -> Option<ActiveDevice> {
        self.active.write().take()
    }

    pub fn current(&self) -> Option<ActiveDevice> {
        self.active.read().clone()
    }

    /// Facade-ready signal
    pub fn is_ready(&self) -> bool {
        self.active.read().is_some()
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.active
            .read()
            .as_ref()
            .is_some_and(|active| active.generation == generation)
    }

    /// Run `publish` only while `generation` is still the installed session
    ///
    /// The read lock is held across `publish`, so a concurrent `clear` cannot
    /// slip in between the check and the publication. `publish` must only
    /// store values: anything that may read this handle again (observers in
    /// particular) has to run after this returns, since a queued `clear`
    /// blocks new readers.
    pub fn publish_if_current<R>(&self, generation: u64, publish: impl FnOnce() -> R) -> Option<R> {
        let active = self.active.read();
        match active.as_ref() {
            Some(active) if active.generation == generation => Some(publish()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use b5dc_device::sim::SimulatedDevice;
    use b5dc_device::RegisterFacade;

    fn install(handle: &DeviceHandle, device: &SimulatedDevice) -> ActiveDevice {
        let link = device.detached_link();
        handle.install(Arc::new(RegisterFacade::new(link.clone())), link)
    }

    #[test]
    fn test_install_and_clear() {
        let handle = DeviceHandle::new();
        let device = SimulatedDevice::new();
        assert!(!handle.is_ready());

        let first = install(&handle, &device);
        assert!(handle.is_ready());
        assert!(handle.is_current(first.generation));

        let second = install(&handle, &device);
        assert!(second.generation > first.generation);
        assert!(!handle.is_current(first.generation));
        assert_eq!(handle.publish_if_current(first.generation, || 1), None);
        assert_eq!(handle.publish_if_current(second.generation, || 2), Some(2));

        assert!(handle.clear().is_some());
        assert!(!handle.is_ready());
        assert!(handle.current().is_none());
        assert_eq!(handle.publish_if_current(second.generation, || 3), None);
    }
}
