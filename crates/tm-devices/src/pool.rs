//! Device pool with per-device in-flight counters.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tm_types::AllocatorError;
use tracing::debug;

use crate::lease::DeviceLease;

/// Logical accelerator index in `0..num_devices`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub usize);

impl DeviceId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for DeviceId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Point-in-time view of the pool counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// In-flight trial count per device, indexed by device id.
    pub loads: Vec<usize>,
    /// Total successful acquisitions since the pool was created.
    pub acquisitions: u64,
    /// Total successful releases since the pool was created.
    pub releases: u64,
}

impl PoolSnapshot {
    /// Number of leases currently outstanding.
    pub fn active(&self) -> usize {
        self.loads.iter().sum()
    }

    pub fn is_idle(&self) -> bool {
        self.loads.iter().all(|&load| load == 0)
    }

    pub fn max_load(&self) -> usize {
        self.loads.iter().copied().max().unwrap_or(0)
    }
}

#[derive(Debug)]
struct PoolState {
    loads: Vec<usize>,
    acquisitions: u64,
    releases: u64,
}

/// Fixed-size pool of accelerator devices.
///
/// Every counter mutation happens under a single lock, so the sum of the
/// counters always equals the number of outstanding leases. `acquire` never
/// waits: when every device is busy it still returns the least-loaded one,
/// which means a device can be oversubscribed.
#[derive(Debug)]
pub struct DevicePool {
    state: Mutex<PoolState>,
}

impl DevicePool {
    /// Create a pool of `num_devices` idle devices.
    pub fn new(num_devices: usize) -> Result<Self, AllocatorError> {
        if num_devices == 0 {
            return Err(AllocatorError::EmptyPool);
        }

        Ok(Self {
            state: Mutex::new(PoolState {
                loads: vec![0; num_devices],
                acquisitions: 0,
                releases: 0,
            }),
        })
    }

    pub fn num_devices(&self) -> usize {
        self.state.lock().loads.len()
    }

    /// Pick the device with the fewest in-flight trials (lowest index on
    /// ties) and count one more trial against it.
    pub fn acquire(&self) -> DeviceId {
        let mut state = self.state.lock();

        let mut best = 0;
        for (index, &load) in state.loads.iter().enumerate().skip(1) {
            if load < state.loads[best] {
                best = index;
            }
        }

        state.loads[best] += 1;
        state.acquisitions += 1;

        let load = state.loads[best];
        drop(state);

        if load > 1 {
            debug!(device = best, load, "Acquired oversubscribed device");
        } else {
            debug!(device = best, load, "Acquired device");
        }

        DeviceId(best)
    }

    /// Return one in-flight trial on `device` to the pool.
    ///
    /// Fails with [`AllocatorError::InvalidRelease`] if the id is out of
    /// range or the device has no outstanding lease; counters are not
    /// touched in that case.
    pub fn release(&self, device: DeviceId) -> Result<(), AllocatorError> {
        let mut state = self.state.lock();
        let num_devices = state.loads.len();

        let load = state
            .loads
            .get_mut(device.index())
            .ok_or_else(|| AllocatorError::InvalidRelease {
                device: device.index(),
                reason: format!("device out of range for pool of {num_devices}"),
            })?;

        if *load == 0 {
            return Err(AllocatorError::InvalidRelease {
                device: device.index(),
                reason: "device has no outstanding lease".to_string(),
            });
        }

        *load -= 1;
        let remaining = *load;
        state.releases += 1;
        drop(state);

        debug!(device = device.index(), load = remaining, "Released device");
        Ok(())
    }

    /// Acquire a device wrapped in a guard that releases it on drop.
    pub fn lease(&self) -> DeviceLease<'_> {
        let device = self.acquire();
        DeviceLease::new(self, device)
    }

    /// Run `f` with a leased device, releasing it afterwards even if `f`
    /// unwinds.
    pub fn with_device<T>(&self, f: impl FnOnce(DeviceId) -> T) -> T {
        let lease = self.lease();
        f(lease.device())
    }

    /// In-flight count for a single device, `None` if out of range.
    pub fn load(&self, device: DeviceId) -> Option<usize> {
        self.state.lock().loads.get(device.index()).copied()
    }

    pub fn loads(&self) -> Vec<usize> {
        self.state.lock().loads.clone()
    }

    /// Number of leases currently outstanding across all devices.
    pub fn active(&self) -> usize {
        self.state.lock().loads.iter().sum()
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let state = self.state.lock();
        PoolSnapshot {
            loads: state.loads.clone(),
            acquisitions: state.acquisitions,
            releases: state.releases,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a pool with the given counters by acquiring in a fixed order.
    fn pool_with_loads(loads: &[usize]) -> DevicePool {
        let pool = DevicePool::new(loads.len()).unwrap();
        {
            let mut state = pool.state.lock();
            state.loads.copy_from_slice(loads);
            state.acquisitions = loads.iter().sum::<usize>() as u64;
        }
        pool
    }

    #[test]
    fn empty_pool_rejected() {
        assert_eq!(DevicePool::new(0).unwrap_err(), AllocatorError::EmptyPool);
    }

    #[test]
    fn new_pool_is_idle() {
        let pool = DevicePool::new(4).unwrap();
        assert_eq!(pool.num_devices(), 4);
        assert_eq!(pool.loads(), vec![0, 0, 0, 0]);
        assert!(pool.snapshot().is_idle());
    }

    #[test]
    fn acquire_picks_least_loaded_lowest_index() {
        let pool = pool_with_loads(&[2, 1, 1]);
        assert_eq!(pool.acquire(), DeviceId(1));
        assert_eq!(pool.loads(), vec![2, 2, 1]);
    }

    #[test]
    fn acquire_prefers_strictly_lower_load() {
        let pool = pool_with_loads(&[1, 1, 0]);
        assert_eq!(pool.acquire(), DeviceId(2));
    }

    #[test]
    fn acquire_then_release_restores_counter() {
        let pool = pool_with_loads(&[3, 0, 5]);
        let before = pool.loads();
        let device = pool.acquire();
        pool.release(device).unwrap();
        assert_eq!(pool.loads(), before);
    }

    #[test]
    fn two_device_trace() {
        let pool = DevicePool::new(2).unwrap();
        let first = pool.acquire();
        let second = pool.acquire();
        let third = pool.acquire();
        assert_eq!([first, second, third], [DeviceId(0), DeviceId(1), DeviceId(0)]);
        assert_eq!(pool.loads(), vec![2, 1]);

        pool.release(first).unwrap();
        assert_eq!(pool.loads(), vec![1, 1]);
    }

    #[test]
    fn single_device_oversubscribes() {
        let pool = DevicePool::new(1).unwrap();
        for _ in 0..5 {
            assert_eq!(pool.acquire(), DeviceId(0));
        }
        assert_eq!(pool.load(DeviceId(0)), Some(5));
    }

    #[test]
    fn release_out_of_range_leaves_state() {
        let pool = pool_with_loads(&[1, 0]);
        let err = pool.release(DeviceId(7)).unwrap_err();
        assert!(matches!(err, AllocatorError::InvalidRelease { device: 7, .. }));
        assert_eq!(pool.loads(), vec![1, 0]);
        assert_eq!(pool.snapshot().releases, 0);
    }

    #[test]
    fn release_never_acquired_leaves_state() {
        let pool = pool_with_loads(&[1, 0]);
        let err = pool.release(DeviceId(1)).unwrap_err();
        assert!(matches!(err, AllocatorError::InvalidRelease { device: 1, .. }));
        assert_eq!(pool.loads(), vec![1, 0]);
    }

    #[test]
    fn double_release_rejected() {
        let pool = DevicePool::new(2).unwrap();
        let device = pool.acquire();
        pool.release(device).unwrap();
        assert!(pool.release(device).is_err());
        assert_eq!(pool.loads(), vec![0, 0]);
    }

    #[test]
    fn snapshot_counts() {
        let pool = DevicePool::new(3).unwrap();
        let a = pool.acquire();
        let _b = pool.acquire();
        pool.release(a).unwrap();

        let snap = pool.snapshot();
        assert_eq!(snap.acquisitions, 2);
        assert_eq!(snap.releases, 1);
        assert_eq!(snap.active(), 1);
        assert_eq!(snap.max_load(), 1);
        assert_eq!(pool.active(), 1);
    }

    #[test]
    fn device_id_display_and_serde() {
        let id = DeviceId::from(3);
        assert_eq!(id.to_string(), "3");
        assert_eq!(serde_json::to_string(&id).unwrap(), "3");
        let back: DeviceId = serde_json::from_str("3").unwrap();
        assert_eq!(back, id);
    }
}
