//! Entity registry: one record per physical device seen on (or restored from)
//! the bus.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use wallpad_packet::Command;
use wallpad_packet::Identity;
use wallpad_packet::Packet;
use wallpad_packet::Platform;

use crate::device::DeviceHandle;
use crate::device::EntityDevice;

/// A discovered device and its latest snapshot.
#[derive(Debug, Clone)]
pub struct EntityRecord {
    pub identity: Identity,
    pub platform: Platform,
    pub packet: Packet,

    /// False for records restored from disk until the device reports in
    pub available: bool,

    pub device: Option<DeviceHandle>,
}

impl EntityRecord {
    fn seen(packet: Packet) -> Self {
        Self {
            identity: packet.identity(),
            platform: packet.platform(),
            packet,
            available: true,
            device: None,
        }
    }

    fn placeholder(identity: Identity) -> Self {
        Self {
            available: false,
            ..Self::seen(Packet::query(identity))
        }
    }

    /// The bound device, if one is bound and still alive.
    pub fn device(&self) -> Option<Arc<dyn EntityDevice>> {
        self.device.as_ref().and_then(DeviceHandle::upgrade)
    }
}

#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: HashMap<Identity, EntityRecord>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh the record for the packet's identity.
    ///
    /// A query carries no state, so for a known identity it only marks the
    /// record available and the last snapshot is kept. Returns a copy of the
    /// stored record and whether it was newly inserted.
    pub fn upsert(&mut self, packet: Packet) -> (EntityRecord, bool) {
        match self.entities.entry(packet.identity()) {
            Entry::Occupied(mut entry) => {
                let record = entry.get_mut();
                if packet.command() != Command::Query {
                    record.packet = packet;
                }
                record.available = true;
                (record.clone(), false)
            }
            Entry::Vacant(entry) => {
                let record = entry.insert(EntityRecord::seen(packet));
                (record.clone(), true)
            }
        }
    }

    pub fn get(&self, identity: &Identity) -> Option<EntityRecord> {
        self.entities.get(identity).cloned()
    }

    /// Every record on `platform`, ordered by identity.
    pub fn all(&self, platform: Platform) -> Vec<EntityRecord> {
        let mut records: Vec<EntityRecord> = self
            .entities
            .values()
            .filter(|record| record.platform == platform)
            .cloned()
            .collect();
        records.sort_by_key(|record| record.identity);
        records
    }

    /// Attach a consumer device. Returns false if the identity is unknown.
    pub fn bind(&mut self, identity: &Identity, handle: DeviceHandle) -> bool {
        match self.entities.get_mut(identity) {
            Some(record) => {
                record.device = Some(handle);
                true
            }
            None => false,
        }
    }

    /// Add unavailable placeholders for identities not yet present.
    ///
    /// Returns how many were added.
    pub fn restore(&mut self, identities: impl IntoIterator<Item = Identity>) -> usize {
        let mut added = 0;
        for identity in identities {
            if let Entry::Vacant(entry) = self.entities.entry(identity) {
                entry.insert(EntityRecord::placeholder(identity));
                added += 1;
            }
        }
        added
    }

    pub fn identities(&self) -> Vec<Identity> {
        let mut identities: Vec<Identity> = self.entities.keys().copied().collect();
        identities.sort();
        identities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
