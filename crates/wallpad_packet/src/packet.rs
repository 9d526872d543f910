use crate::away::AwayPacket;
use crate::away::AwayState;
use crate::error::DecodeError;
use crate::fan::FanPacket;
use crate::frame::MIN_PAYLOAD_LEN;
use crate::kind::Command;
use crate::kind::DeviceKind;
use crate::kind::Header;
use crate::kind::Identity;
use crate::kind::Platform;
use crate::light::DimmerPacket;
use crate::light::LightPacket;
use crate::switch::GasPacket;
use crate::switch::OutletPacket;
use crate::thermostat::ThermostatPacket;

/// Leading payload byte of every frame on the bus.
pub const PAYLOAD_HEADER: u8 = 0x01;

/// Minimum data bytes following the payload header fields.
const MIN_DATA_LEN: usize = 2;

/// Most data bytes a device of `kind` sends. Thermostats append the current
/// temperature.
fn max_data_len(kind: DeviceKind) -> usize {
    match kind {
        DeviceKind::Thermostat => MIN_DATA_LEN + 1,
        _ => MIN_DATA_LEN,
    }
}

/// A decoded bus message: one device's address plus a snapshot of its state.
///
/// Packets are values. Requesting a change produces a new packet through the
/// variant's `make_change_*` operations; the snapshot it was built from is
/// left as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Light(LightPacket),
    Dimmer(DimmerPacket),
    Outlet(OutletPacket),
    Gas(GasPacket),
    Away(AwayPacket),
    Thermostat(ThermostatPacket),
    Fan(FanPacket),
}

impl Packet {
    /// Build the query that asks `identity` to report its state.
    ///
    /// The carried state is the default for the device kind.
    pub fn query(identity: Identity) -> Self {
        let header = Header::new(Command::Query, identity.room, identity.channel);
        match identity.kind {
            DeviceKind::Light => Packet::Light(LightPacket {
                header,
                state: Default::default(),
            }),
            DeviceKind::Dimmer => Packet::Dimmer(DimmerPacket {
                header,
                state: Default::default(),
            }),
            DeviceKind::Outlet => Packet::Outlet(OutletPacket {
                header,
                state: Default::default(),
            }),
            DeviceKind::Gas => Packet::Gas(GasPacket {
                header,
                state: Default::default(),
            }),
            DeviceKind::AwayLight => Packet::Away(AwayPacket {
                header,
                state: AwayState::Light {
                    power: Default::default(),
                },
            }),
            DeviceKind::AwayGas => Packet::Away(AwayPacket {
                header,
                state: AwayState::Gas {
                    valve: Default::default(),
                },
            }),
            DeviceKind::Thermostat => Packet::Thermostat(ThermostatPacket {
                header,
                state: Default::default(),
            }),
            DeviceKind::Fan => Packet::Fan(FanPacket {
                header,
                state: Default::default(),
            }),
        }
    }

    pub fn header(&self) -> &Header {
        match self {
            Packet::Light(p) => &p.header,
            Packet::Dimmer(p) => &p.header,
            Packet::Outlet(p) => &p.header,
            Packet::Gas(p) => &p.header,
            Packet::Away(p) => &p.header,
            Packet::Thermostat(p) => &p.header,
            Packet::Fan(p) => &p.header,
        }
    }

    pub fn identity(&self) -> Identity {
        match self {
            Packet::Light(p) => p.identity(),
            Packet::Dimmer(p) => p.identity(),
            Packet::Outlet(p) => p.identity(),
            Packet::Gas(p) => p.identity(),
            Packet::Away(p) => p.identity(),
            Packet::Thermostat(p) => p.identity(),
            Packet::Fan(p) => p.identity(),
        }
    }

    pub fn kind(&self) -> DeviceKind {
        self.identity().kind
    }

    pub fn platform(&self) -> Platform {
        self.kind().platform()
    }

    pub fn command(&self) -> Command {
        self.header().command
    }

    /// State fields as a JSON object, e.g. `{"power":"on"}`.
    pub fn state_json(&self) -> serde_json::Value {
        let value = match self {
            Packet::Light(p) => serde_json::to_value(p.state),
            Packet::Dimmer(p) => serde_json::to_value(p.state),
            Packet::Outlet(p) => serde_json::to_value(p.state),
            Packet::Gas(p) => serde_json::to_value(p.state),
            Packet::Away(p) => serde_json::to_value(p.state),
            Packet::Thermostat(p) => serde_json::to_value(p.state),
            Packet::Fan(p) => serde_json::to_value(p.state),
        };
        // Plain structs of enums and integers always serialise.
        value.unwrap_or_default()
    }

    /// Interpret a frame payload (the bytes between LEN and XOR).
    pub fn parse(payload: &[u8]) -> Result<Self, DecodeError> {
        let [header_byte, device, command, value_type, room_channel, data @ ..] = payload else {
            return Err(DecodeError::TooShort {
                len: payload.len(),
            });
        };
        if *header_byte != PAYLOAD_HEADER {
            return Err(DecodeError::BadHeader(*header_byte));
        }

        let kind = DeviceKind::from_wire(*device, *value_type)?;
        let header = Header::from_wire(*command, *room_channel)?;
        if data.len() < MIN_DATA_LEN {
            return Err(DecodeError::MissingData {
                kind,
                expected: MIN_DATA_LEN,
                actual: data.len(),
            });
        }
        if data.len() > max_data_len(kind) {
            return Err(DecodeError::ExtraData {
                kind,
                expected: max_data_len(kind),
                actual: data.len(),
            });
        }

        let packet = match kind {
            DeviceKind::Light => Packet::Light(LightPacket::parse(header, data)?),
            DeviceKind::Dimmer => Packet::Dimmer(DimmerPacket::parse(header, data)?),
            DeviceKind::Outlet => Packet::Outlet(OutletPacket::parse(header, data)?),
            DeviceKind::Gas => Packet::Gas(GasPacket::parse(header, data)?),
            DeviceKind::AwayLight | DeviceKind::AwayGas => {
                Packet::Away(AwayPacket::parse(kind, header, data)?)
            }
            DeviceKind::Thermostat => Packet::Thermostat(ThermostatPacket::parse(header, data)?),
            DeviceKind::Fan => Packet::Fan(FanPacket::parse(header, data)?),
        };
        Ok(packet)
    }

    /// Payload bytes for this packet, ready for [`crate::frame::wrap`].
    pub fn to_payload(&self) -> Vec<u8> {
        let kind = self.kind();
        let header = self.header();
        let data = match self {
            Packet::Light(p) => p.data(),
            Packet::Dimmer(p) => p.data(),
            Packet::Outlet(p) => p.data(),
            Packet::Gas(p) => p.data(),
            Packet::Away(p) => p.data(),
            Packet::Thermostat(p) => p.data(),
            Packet::Fan(p) => p.data(),
        };

        let mut payload = Vec::with_capacity(MIN_PAYLOAD_LEN + 1);
        payload.extend_from_slice(&[
            PAYLOAD_HEADER,
            kind.device_byte(),
            header.command.as_byte(),
            kind.value_type(),
            header.room_channel(),
        ]);
        payload.extend_from_slice(&data);
        payload
    }
}

macro_rules! impl_from_variant {
    ($($variant:ident($ty:ty)),+ $(,)?) => {
        $(
            impl From<$ty> for Packet {
                fn from(packet: $ty) -> Self {
                    Packet::$variant(packet)
                }
            }
        )+
    };
}

impl_from_variant!(
    Light(LightPacket),
    Dimmer(DimmerPacket),
    Outlet(OutletPacket),
    Gas(GasPacket),
    Away(AwayPacket),
    Thermostat(ThermostatPacket),
    Fan(FanPacket),
);
