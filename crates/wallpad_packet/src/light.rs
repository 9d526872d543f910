use serde::Serialize;

use crate::error::ChangeError;
use crate::error::DecodeError;
use crate::kind::DeviceKind;
use crate::kind::Header;
use crate::kind::Identity;
use crate::value::Power;

/// Highest dimmer level; 0 is off.
pub const MAX_BRIGHTNESS: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LightState {
    pub power: Power,
}

/// On/off ceiling light.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightPacket {
    pub header: Header,
    pub state: LightState,
}

impl LightPacket {
    pub fn identity(&self) -> Identity {
        self.header.identity(DeviceKind::Light)
    }

    pub fn is_on(&self) -> bool {
        self.state.power == Power::On
    }

    pub fn make_change_power(&self, power: Power) -> Self {
        Self {
            header: self.header.change(),
            state: LightState { power },
        }
    }

    pub(crate) fn parse(header: Header, data: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            header,
            state: LightState {
                power: Power::from_byte(data[0])?,
            },
        })
    }

    pub(crate) fn data(&self) -> Vec<u8> {
        vec![self.state.power.as_byte(), 0x00]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DimmerState {
    /// 0 (off) to [`MAX_BRIGHTNESS`].
    pub brightness: u8,
}

/// Light with three brightness steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimmerPacket {
    pub header: Header,
    pub state: DimmerState,
}

impl DimmerPacket {
    pub fn identity(&self) -> Identity {
        self.header.identity(DeviceKind::Dimmer)
    }

    pub fn is_on(&self) -> bool {
        self.state.brightness != 0
    }

    pub fn make_change_brightness(&self, brightness: u8) -> Result<Self, ChangeError> {
        if brightness > MAX_BRIGHTNESS {
            return Err(ChangeError::OutOfRange {
                field: "brightness",
                value: brightness,
                min: 0,
                max: MAX_BRIGHTNESS,
            });
        }
        Ok(Self {
            header: self.header.change(),
            state: DimmerState { brightness },
        })
    }

    pub(crate) fn parse(header: Header, data: &[u8]) -> Result<Self, DecodeError> {
        let brightness = data[0];
        if brightness > MAX_BRIGHTNESS {
            return Err(DecodeError::InvalidValue {
                field: "brightness",
                value: brightness,
            });
        }
        Ok(Self {
            header,
            state: DimmerState { brightness },
        })
    }

    pub(crate) fn data(&self) -> Vec<u8> {
        vec![self.state.brightness, 0x00]
    }
}
