//! Probe tables for active discovery.
//!
//! A probe is a query packet; any device that exists answers with a report,
//! which the receive loop then registers like any other frame.

use std::ops::RangeInclusive;

use wallpad_packet::DeviceKind;
use wallpad_packet::Identity;
use wallpad_packet::Packet;
use wallpad_packet::Platform;

const SCAN_ROOMS: RangeInclusive<u8> = 1..=6;

fn per_room(kind: DeviceKind) -> impl Iterator<Item = Identity> {
    SCAN_ROOMS.map(move |room| Identity::new(kind, room, 0))
}

/// Identities probed when `platform` has no known entities.
pub fn probes(platform: Platform) -> Vec<Identity> {
    match platform {
        Platform::Light => per_room(DeviceKind::Light)
            .chain(per_room(DeviceKind::Dimmer))
            .collect(),
        Platform::Switch => per_room(DeviceKind::Outlet)
            .chain([Identity::new(DeviceKind::Gas, 1, 1)])
            .collect(),
        Platform::Climate => vec![Identity::new(DeviceKind::Thermostat, 1, 0)],
        Platform::Fan => vec![Identity::new(DeviceKind::Fan, 1, 1)],
        // Away mode is reported unprompted.
        Platform::BinarySensor => Vec::new(),
    }
}

/// Encoded probe frames for `platform`, in send order.
pub fn probe_frames(platform: Platform) -> Vec<Vec<u8>> {
    probes(platform)
        .into_iter()
        .map(|identity| wallpad_packet::encode(&Packet::query(identity)))
        .collect()
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;
    use wallpad_packet::Command;

    use super::*;

    #[test]
    fn test_probe_counts() {
        assert_eq!(probes(Platform::Light).len(), 12);
        assert_eq!(probes(Platform::Switch).len(), 7);
        assert_eq!(probes(Platform::Climate).len(), 1);
        assert_eq!(probes(Platform::Fan).len(), 1);
        assert!(probes(Platform::BinarySensor).is_empty());
    }

    #[test]
    fn test_probes_belong_to_their_platform() {
        for platform in Platform::iter() {
            for identity in probes(platform) {
                assert_eq!(identity.platform(), platform, "{}", identity);
            }
        }
    }

    #[test]
    fn test_first_light_probe() {
        let frames = probe_frames(Platform::Light);
        let payload = wallpad_packet::frame::unwrap(&frames[0]).unwrap();
        assert_eq!(payload, [0x01, 0x19, 0x01, 0x40, 0x10, 0x00, 0x00]);

        for frame in &frames {
            assert_eq!(wallpad_packet::decode(frame).unwrap().command(), Command::Query);
        }
    }

    #[test]
    fn test_gas_probe_uses_channel_one() {
        assert_eq!(
            probes(Platform::Switch).last(),
            Some(&Identity::new(DeviceKind::Gas, 1, 1))
        );
    }
}
