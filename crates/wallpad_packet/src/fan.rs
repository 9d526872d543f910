use serde::Serialize;

use crate::error::DecodeError;
use crate::kind::DeviceKind;
use crate::kind::Header;
use crate::kind::Identity;
use crate::value::FanMode;
use crate::value::FanSpeed;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FanState {
    pub mode: FanMode,
    /// Only meaningful in [`FanMode::Manual`].
    pub speed: FanSpeed,
}

/// Ventilation unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanPacket {
    pub header: Header,
    pub state: FanState,
}

impl FanPacket {
    pub fn identity(&self) -> Identity {
        self.header.identity(DeviceKind::Fan)
    }

    pub fn is_on(&self) -> bool {
        self.state.mode != FanMode::Off
    }

    pub fn make_change_mode(&self, mode: FanMode) -> Self {
        Self {
            header: self.header.change(),
            state: FanState {
                mode,
                ..self.state
            },
        }
    }

    pub fn make_change_speed(&self, speed: FanSpeed) -> Self {
        Self {
            header: self.header.change(),
            state: FanState {
                speed,
                ..self.state
            },
        }
    }

    pub(crate) fn parse(header: Header, data: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            header,
            state: FanState {
                mode: FanMode::from_byte(data[0])?,
                speed: FanSpeed::from_byte(data[1])?,
            },
        })
    }

    pub(crate) fn data(&self) -> Vec<u8> {
        vec![self.state.mode.as_byte(), self.state.speed.as_byte()]
    }
}
