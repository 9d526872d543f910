//! Packet codec for the Imazu wall pad RS485 bus.
//!
//! [`decode`] turns one complete frame into a typed [`Packet`]; [`encode`]
//! does the reverse. [`FrameDecoder`] splits a raw byte stream into frames.

mod away;
mod error;
mod fan;
pub mod frame;
mod kind;
mod light;
mod packet;
mod switch;
mod thermostat;
mod value;

pub use away::AwayPacket;
pub use away::AwayState;
pub use error::ChangeError;
pub use error::DecodeError;
pub use error::FrameError;
pub use error::Result;
pub use fan::FanPacket;
pub use fan::FanState;
pub use frame::FrameDecoder;
pub use kind::Command;
pub use kind::DeviceKind;
pub use kind::Header;
pub use kind::Identity;
pub use kind::MAX_ADDRESS;
pub use kind::Platform;
pub use light::DimmerPacket;
pub use light::DimmerState;
pub use light::LightPacket;
pub use light::LightState;
pub use light::MAX_BRIGHTNESS;
pub use packet::Packet;
pub use switch::GasPacket;
pub use switch::GasState;
pub use switch::OutletPacket;
pub use switch::OutletState;
pub use thermostat::MAX_TARGET_TEMP;
pub use thermostat::MIN_TARGET_TEMP;
pub use thermostat::ThermostatPacket;
pub use thermostat::ThermostatState;
pub use value::FanMode;
pub use value::FanSpeed;
pub use value::Power;
pub use value::ThermostatMode;
pub use value::Valve;

/// Decode one complete frame, checking its envelope and checksum first.
pub fn decode(frame: &[u8]) -> Result<Packet> {
    let payload = frame::unwrap(frame)?;
    Packet::parse(payload)
}

/// Encode a packet into a complete frame.
///
/// Room and channel are truncated to [`MAX_ADDRESS`]; check them with
/// [`Identity::check_address`] before sending.
pub fn encode(packet: &Packet) -> Vec<u8> {
    frame::wrap(&packet.to_payload())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_round_trip() {
        let header = Header::new(Command::Report, 3, 2);
        let packets: Vec<Packet> = vec![
            LightPacket {
                header,
                state: LightState { power: Power::On },
            }
            .into(),
            OutletPacket {
                header,
                state: OutletState { power: Power::Off },
            }
            .into(),
            AwayPacket {
                header,
                state: AwayState::Gas { valve: Valve::Open },
            }
            .into(),
            FanPacket {
                header,
                state: FanState {
                    mode: FanMode::Auto,
                    speed: FanSpeed::Off,
                },
            }
            .into(),
        ];

        for packet in packets {
            let decoded = decode(&encode(&packet)).unwrap();
            assert_eq!(decoded.identity(), packet.identity());
            assert_eq!(decoded, packet);
        }
    }

    #[test]
    fn test_decode_light_probe_frame() {
        let frame = frame::wrap(&[0x01, 0x19, 0x01, 0x40, 0x10, 0x00, 0x00]);
        let packet = decode(&frame).unwrap();
        assert_eq!(packet.identity(), Identity::new(DeviceKind::Light, 1, 0));
        assert_eq!(encode(&packet), frame);
    }

    #[test]
    fn test_decode_rejects_corruption() {
        let mut frame = encode(&Packet::query(Identity::new(DeviceKind::Dimmer, 2, 0)));
        frame[6] ^= 0x01;
        assert!(matches!(decode(&frame), Err(DecodeError::Checksum { .. })));
    }

    #[test]
    fn test_change_then_encode() {
        let dimmer = DimmerPacket {
            header: Header::new(Command::Report, 1, 1),
            state: DimmerState { brightness: 2 },
        };
        let frame = encode(&dimmer.make_change_brightness(0).unwrap().into());
        let decoded = decode(&frame).unwrap();

        assert_eq!(decoded.command(), Command::Change);
        assert_eq!(decoded.state_json()["brightness"], 0);
        assert_eq!(dimmer.state.brightness, 2);
    }
}
