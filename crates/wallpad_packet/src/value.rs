//! Single-byte state values carried in packet data.

use serde::Serialize;
use strum::Display;

use crate::error::DecodeError;

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $($(#[$vmeta:meta])* $variant:ident = $byte:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Display)]
        #[serde(rename_all = "lowercase")]
        #[strum(serialize_all = "lowercase")]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl $name {
            pub fn as_byte(self) -> u8 {
                match self {
                    $($name::$variant => $byte,)+
                }
            }

            pub fn from_byte(value: u8) -> Result<Self, DecodeError> {
                match value {
                    $($byte => Ok($name::$variant),)+
                    _ => Err(DecodeError::InvalidValue {
                        field: $field,
                        value,
                    }),
                }
            }
        }
    };
}

wire_enum! {
    /// On/off state of lights, outlets and the away-mode light cut-off.
    Power, "power" {
        #[default]
        Off = 0x00,
        On = 0x01,
    }
}

wire_enum! {
    /// Gas valve position.
    Valve, "valve" {
        #[default]
        Closed = 0x00,
        Open = 0x01,
    }
}

wire_enum! {
    ThermostatMode, "thermostat mode" {
        #[default]
        Off = 0x00,
        Heat = 0x01,
        Away = 0x07,
    }
}

wire_enum! {
    FanMode, "fan mode" {
        #[default]
        Off = 0x00,
        Auto = 0x01,
        Manual = 0x02,
    }
}

wire_enum! {
    FanSpeed, "fan speed" {
        #[default]
        Off = 0x00,
        Low = 0x01,
        Medium = 0x02,
        High = 0x03,
    }
}
