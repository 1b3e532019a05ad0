//! Scoped device acquisition.

use tm_types::AllocatorError;
use tracing::warn;

use crate::pool::{DeviceId, DevicePool};

/// A device held by one trial.
///
/// The device goes back to the pool exactly once: either through
/// [`DeviceLease::release`] or when the guard is dropped, including during a
/// panic unwind.
#[derive(Debug)]
#[must_use = "dropping a lease immediately releases the device"]
pub struct DeviceLease<'a> {
    pool: &'a DevicePool,
    device: DeviceId,
    released: bool,
}

impl<'a> DeviceLease<'a> {
    pub(crate) fn new(pool: &'a DevicePool, device: DeviceId) -> Self {
        Self {
            pool,
            device,
            released: false,
        }
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// Release the device now and surface any allocator error.
    pub fn release(mut self) -> Result<(), AllocatorError> {
        self.released = true;
        self.pool.release(self.device)
    }
}

impl Drop for DeviceLease<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.pool.release(self.device) {
            warn!(device = self.device.index(), error = %e, "Lease release failed");
        }
    }
}
