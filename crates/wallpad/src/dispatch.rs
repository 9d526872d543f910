//! Per-platform "entity added" signals.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use tracing::debug;
use wallpad_packet::Platform;

use crate::registry::EntityRecord;

pub type Listener = Arc<dyn Fn(&EntityRecord) + Send + Sync>;

/// Token returned by [`DispatchBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    platform: Platform,
    id: u64,
}

impl Subscription {
    pub fn platform(&self) -> Platform {
        self.platform
    }
}

/// Fans newly discovered entities out to the listeners of their platform.
///
/// Delivery is synchronous and in subscription order. Each publish works on a
/// snapshot of the listener list, so listeners may subscribe or unsubscribe
/// from inside a callback.
#[derive(Default)]
pub struct DispatchBus {
    listeners: Mutex<HashMap<Platform, Vec<(u64, Listener)>>>,
    next_id: AtomicU64,
}

impl DispatchBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, platform: Platform, listener: F) -> Subscription
    where
        F: Fn(&EntityRecord) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock()
            .entry(platform)
            .or_default()
            .push((id, Arc::new(listener)));
        debug!("Listener {} subscribed to {}", id, platform);
        Subscription { platform, id }
    }

    /// Returns false if the subscription was already gone.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        let mut listeners = self.lock();
        let Some(list) = listeners.get_mut(&subscription.platform) else {
            return false;
        };
        let before = list.len();
        list.retain(|(id, _)| *id != subscription.id);
        before != list.len()
    }

    /// Call every listener of `platform`. Returns how many were called.
    pub fn publish(&self, platform: Platform, record: &EntityRecord) -> usize {
        let snapshot: Vec<Listener> = self
            .lock()
            .get(&platform)
            .map(|list| list.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();

        for listener in &snapshot {
            listener(record);
        }
        snapshot.len()
    }

    pub fn listener_count(&self, platform: Platform) -> usize {
        self.lock().get(&platform).map_or(0, Vec::len)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Platform, Vec<(u64, Listener)>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One platform's view of a [`DispatchBus`].
#[derive(Clone)]
pub struct EntityAddSignal {
    bus: Arc<DispatchBus>,
    platform: Platform,
}

impl EntityAddSignal {
    pub fn new(bus: Arc<DispatchBus>, platform: Platform) -> Self {
        Self { bus, platform }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn connect<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&EntityRecord) + Send + Sync + 'static,
    {
        self.bus.subscribe(self.platform, listener)
    }

    pub fn disconnect(&self, subscription: &Subscription) -> bool {
        self.bus.unsubscribe(subscription)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use wallpad_packet::DeviceKind;
    use wallpad_packet::Identity;
    use wallpad_packet::Packet;

    use super::*;
    use crate::registry::EntityRegistry;

    fn record(kind: DeviceKind) -> EntityRecord {
        EntityRegistry::new()
            .upsert(Packet::query(Identity::new(kind, 1, 0)))
            .0
    }

    #[test]
    fn test_publish_reaches_platform_listeners_only() {
        let bus = DispatchBus::new();
        let lights = Arc::new(AtomicUsize::new(0));
        let switches = Arc::new(AtomicUsize::new(0));

        let counter = lights.clone();
        bus.subscribe(Platform::Light, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = switches.clone();
        bus.subscribe(Platform::Switch, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.publish(Platform::Light, &record(DeviceKind::Light)), 1);
        assert_eq!(lights.load(Ordering::SeqCst), 1);
        assert_eq!(switches.load(Ordering::SeqCst), 0);
        assert_eq!(bus.publish(Platform::Fan, &record(DeviceKind::Fan)), 0);
    }

    #[test]
    fn test_delivery_in_subscription_order() {
        let bus = DispatchBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let order = order.clone();
            bus.subscribe(Platform::Light, move |_| order.lock().unwrap().push(n));
        }

        bus.publish(Platform::Light, &record(DeviceKind::Dimmer));
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = DispatchBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let sub = bus.subscribe(Platform::Climate, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(sub.platform(), Platform::Climate);

        assert!(bus.unsubscribe(&sub));
        assert!(!bus.unsubscribe(&sub));
        bus.publish(Platform::Climate, &record(DeviceKind::Thermostat));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(bus.listener_count(Platform::Climate), 0);
    }

    #[test]
    fn test_listener_may_subscribe_reentrantly() {
        let bus = Arc::new(DispatchBus::new());
        let inner = bus.clone();
        bus.subscribe(Platform::Light, move |_| {
            inner.subscribe(Platform::Light, |_| {});
        });

        assert_eq!(bus.publish(Platform::Light, &record(DeviceKind::Light)), 1);
        assert_eq!(bus.listener_count(Platform::Light), 2);
    }

    #[test]
    fn test_entity_add_signal() {
        let bus = Arc::new(DispatchBus::new());
        let signal = EntityAddSignal::new(bus.clone(), Platform::Fan);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let sub = signal.connect(move |record| sink.lock().unwrap().push(record.identity));
        bus.publish(Platform::Fan, &record(DeviceKind::Fan));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Identity::new(DeviceKind::Fan, 1, 0)]
        );
        assert!(signal.disconnect(&sub));
    }
}
