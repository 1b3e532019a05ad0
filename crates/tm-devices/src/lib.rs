//! # tm-devices
//!
//! Load-balanced assignment of accelerator devices to concurrently running
//! trials.
//!
//! A [`DevicePool`] tracks how many trials currently hold each device and
//! hands out the least-loaded one on every [`DevicePool::acquire`]. Callers
//! should prefer [`DevicePool::lease`], which returns a [`DeviceLease`] guard
//! that gives the device back when dropped, even if the trial panics.

mod lease;
mod pool;

pub use lease::DeviceLease;
pub use pool::{DeviceId, DevicePool, PoolSnapshot};
