use serde::Serialize;

use crate::error::ChangeError;
use crate::error::DecodeError;
use crate::kind::DeviceKind;
use crate::kind::Header;
use crate::kind::Identity;
use crate::value::ThermostatMode;

pub const MIN_TARGET_TEMP: u8 = 5;
pub const MAX_TARGET_TEMP: u8 = 35;

/// Temperatures are whole degrees Celsius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ThermostatState {
    pub mode: ThermostatMode,
    pub target: u8,
    /// Only present in reports from the thermostat itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<u8>,
}

/// Floor-heating room thermostat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThermostatPacket {
    pub header: Header,
    pub state: ThermostatState,
}

impl ThermostatPacket {
    pub fn identity(&self) -> Identity {
        self.header.identity(DeviceKind::Thermostat)
    }

    pub fn make_change_mode(&self, mode: ThermostatMode) -> Self {
        Self {
            header: self.header.change(),
            state: ThermostatState {
                mode,
                ..self.state
            },
        }
    }

    pub fn make_change_target_temp(&self, target: u8) -> Result<Self, ChangeError> {
        if !(MIN_TARGET_TEMP..=MAX_TARGET_TEMP).contains(&target) {
            return Err(ChangeError::OutOfRange {
                field: "target temperature",
                value: target,
                min: MIN_TARGET_TEMP,
                max: MAX_TARGET_TEMP,
            });
        }
        Ok(Self {
            header: self.header.change(),
            state: ThermostatState {
                target,
                ..self.state
            },
        })
    }

    pub(crate) fn parse(header: Header, data: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            header,
            state: ThermostatState {
                mode: ThermostatMode::from_byte(data[0])?,
                target: data[1],
                current: data.get(2).copied(),
            },
        })
    }

    pub(crate) fn data(&self) -> Vec<u8> {
        let mut data = vec![self.state.mode.as_byte(), self.state.target];
        data.extend(self.state.current);
        data
    }
}
