//! Device identities and the platform categories they are exposed under.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use strum::Display;
use strum::EnumIter;
use strum::EnumString;

use crate::error::ChangeError;
use crate::error::DecodeError;

/// Platform category an entity is announced under.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Platform {
    Light,
    Switch,
    Fan,
    Climate,
    BinarySensor,
}

/// Physical device kinds found on the bus.
///
/// The away-mode controller reports two independent cut-offs (lights and gas)
/// under the same device byte; they are separate kinds so each gets its own
/// identity.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceKind {
    Light,
    Dimmer,
    Outlet,
    Gas,
    AwayLight,
    AwayGas,
    Thermostat,
    Fan,
}

const DEVICE_THERMOSTAT: u8 = 0x18;
const DEVICE_LIGHT: u8 = 0x19;
const DEVICE_DIMMER: u8 = 0x1a;
const DEVICE_GAS: u8 = 0x1b;
const DEVICE_OUTLET: u8 = 0x1f;
const DEVICE_AWAY: u8 = 0x2a;
const DEVICE_FAN: u8 = 0x2b;

const VALUE_POWER: u8 = 0x40;
const VALUE_BRIGHTNESS: u8 = 0x42;
const VALUE_VALVE: u8 = 0x43;
const VALUE_THERMOSTAT: u8 = 0x46;

/// Largest room or channel number; each owns one nibble of the address byte.
pub const MAX_ADDRESS: u8 = 0x0f;

impl DeviceKind {
    /// Platform this kind of device is exposed on.
    pub fn platform(self) -> Platform {
        match self {
            DeviceKind::Light | DeviceKind::Dimmer => Platform::Light,
            DeviceKind::Outlet | DeviceKind::Gas => Platform::Switch,
            DeviceKind::AwayLight | DeviceKind::AwayGas => Platform::BinarySensor,
            DeviceKind::Thermostat => Platform::Climate,
            DeviceKind::Fan => Platform::Fan,
        }
    }

    pub(crate) fn device_byte(self) -> u8 {
        match self {
            DeviceKind::Light => DEVICE_LIGHT,
            DeviceKind::Dimmer => DEVICE_DIMMER,
            DeviceKind::Outlet => DEVICE_OUTLET,
            DeviceKind::Gas => DEVICE_GAS,
            DeviceKind::AwayLight | DeviceKind::AwayGas => DEVICE_AWAY,
            DeviceKind::Thermostat => DEVICE_THERMOSTAT,
            DeviceKind::Fan => DEVICE_FAN,
        }
    }

    pub(crate) fn value_type(self) -> u8 {
        match self {
            DeviceKind::Light | DeviceKind::Outlet | DeviceKind::AwayLight | DeviceKind::Fan => {
                VALUE_POWER
            }
            DeviceKind::Dimmer => VALUE_BRIGHTNESS,
            DeviceKind::Gas | DeviceKind::AwayGas => VALUE_VALVE,
            DeviceKind::Thermostat => VALUE_THERMOSTAT,
        }
    }

    pub(crate) fn from_wire(device: u8, value_type: u8) -> Result<Self, DecodeError> {
        let kind = match (device, value_type) {
            (DEVICE_LIGHT, VALUE_POWER) => DeviceKind::Light,
            (DEVICE_DIMMER, VALUE_BRIGHTNESS) => DeviceKind::Dimmer,
            (DEVICE_OUTLET, VALUE_POWER) => DeviceKind::Outlet,
            (DEVICE_GAS, VALUE_VALVE) => DeviceKind::Gas,
            (DEVICE_AWAY, VALUE_POWER) => DeviceKind::AwayLight,
            (DEVICE_AWAY, VALUE_VALVE) => DeviceKind::AwayGas,
            (DEVICE_THERMOSTAT, VALUE_THERMOSTAT) => DeviceKind::Thermostat,
            (DEVICE_FAN, VALUE_POWER) => DeviceKind::Fan,
            (
                DEVICE_LIGHT | DEVICE_DIMMER | DEVICE_OUTLET | DEVICE_GAS | DEVICE_AWAY
                | DEVICE_THERMOSTAT | DEVICE_FAN,
                _,
            ) => return Err(DecodeError::UnexpectedValueType { device, value_type }),
            _ => return Err(DecodeError::UnknownDevice(device)),
        };
        Ok(kind)
    }
}

/// Stable key of one physical device: its kind plus room and channel.
///
/// Room and channel share one byte on the wire, so both are 4-bit values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity {
    pub kind: DeviceKind,
    pub room: u8,
    pub channel: u8,
}

impl Identity {
    pub fn new(kind: DeviceKind, room: u8, channel: u8) -> Self {
        Self {
            kind,
            room,
            channel,
        }
    }

    pub fn platform(&self) -> Platform {
        self.kind.platform()
    }

    /// Fails when room or channel cannot be written to the bus.
    ///
    /// [`crate::encode`] keeps only the low nibble of each, so an unchecked
    /// out-of-range identity would address a different device.
    pub fn check_address(&self) -> Result<(), ChangeError> {
        for (field, value) in [("room", self.room), ("channel", self.channel)] {
            if value > MAX_ADDRESS {
                return Err(ChangeError::OutOfRange {
                    field,
                    value,
                    min: 0,
                    max: MAX_ADDRESS,
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind, self.room, self.channel)
    }
}

/// What a frame asks for or reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Command {
    /// Ask a device to report its state.
    Query,
    /// Ask a device to move to the carried state.
    Change,
    /// A device reporting its state.
    Report,
}

impl Command {
    pub(crate) fn as_byte(self) -> u8 {
        match self {
            Command::Query => 0x01,
            Command::Change => 0x02,
            Command::Report => 0x04,
        }
    }

    pub(crate) fn from_byte(byte: u8) -> Result<Self, DecodeError> {
        match byte {
            0x01 => Ok(Command::Query),
            0x02 => Ok(Command::Change),
            0x04 => Ok(Command::Report),
            other => Err(DecodeError::UnknownCommand(other)),
        }
    }
}

/// Addressing shared by every packet variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Header {
    pub command: Command,
    pub room: u8,
    pub channel: u8,
}

impl Header {
    pub fn new(command: Command, room: u8, channel: u8) -> Self {
        Self {
            command,
            room,
            channel,
        }
    }

    /// Same address, carrying a change request.
    pub fn change(&self) -> Self {
        Self {
            command: Command::Change,
            ..*self
        }
    }

    pub fn identity(&self, kind: DeviceKind) -> Identity {
        Identity::new(kind, self.room, self.channel)
    }

    pub(crate) fn room_channel(&self) -> u8 {
        ((self.room & 0x0f) << 4) | (self.channel & 0x0f)
    }

    pub(crate) fn from_wire(command: u8, room_channel: u8) -> Result<Self, DecodeError> {
        Ok(Self {
            command: Command::from_byte(command)?,
            room: room_channel >> 4,
            channel: room_channel & 0x0f,
        })
    }
}
