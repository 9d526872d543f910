//! The seam between the gateway and whatever presents entities to users.

use std::fmt;
use std::sync::Arc;
use std::sync::Weak;

use wallpad_packet::Packet;

/// A consumer-side object that mirrors one entity.
///
/// The gateway calls [`EntityDevice::on_state_changed`] from its receive loop
/// every time a frame for an already-known entity arrives, so implementations
/// should return quickly.
pub trait EntityDevice: Send + Sync {
    fn on_state_changed(&self, packet: &Packet);
}

/// Non-owning reference from a registry record to its consumer device.
///
/// The consumer keeps the `Arc`; once it is dropped the handle goes dead and
/// the gateway simply stops notifying.
#[derive(Clone)]
pub struct DeviceHandle(Weak<dyn EntityDevice>);

impl DeviceHandle {
    pub fn new<D: EntityDevice + 'static>(device: &Arc<D>) -> Self {
        let weak: Weak<D> = Arc::downgrade(device);
        Self(weak)
    }

    pub fn upgrade(&self) -> Option<Arc<dyn EntityDevice>> {
        self.0.upgrade()
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DeviceHandle")
            .field(&if self.is_alive() { "alive" } else { "dropped" })
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records every packet it is notified with.
    #[derive(Default)]
    pub struct RecordingDevice {
        pub updates: Mutex<Vec<Packet>>,
    }

    impl RecordingDevice {
        pub fn count(&self) -> usize {
            self.updates.lock().unwrap().len()
        }

        pub fn last(&self) -> Option<Packet> {
            self.updates.lock().unwrap().last().cloned()
        }
    }

    impl EntityDevice for RecordingDevice {
        fn on_state_changed(&self, packet: &Packet) {
            self.updates.lock().unwrap().push(packet.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use wallpad_packet::DeviceKind;
    use wallpad_packet::Identity;

    use super::testing::RecordingDevice;
    use super::*;

    #[test]
    fn test_handle_follows_device_lifetime() {
        let device = Arc::new(RecordingDevice::default());
        let handle = DeviceHandle::new(&device);
        assert!(handle.is_alive());

        let packet = Packet::query(Identity::new(DeviceKind::Outlet, 2, 0));
        handle.upgrade().unwrap().on_state_changed(&packet);
        assert_eq!(device.count(), 1);

        drop(device);
        assert!(!handle.is_alive());
        assert!(handle.upgrade().is_none());
    }
}
