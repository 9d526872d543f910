use serde::Serialize;

use crate::error::DecodeError;
use crate::kind::DeviceKind;
use crate::kind::Header;
use crate::kind::Identity;
use crate::value::Power;
use crate::value::Valve;

/// What the away-mode controller reports for one of its cut-offs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AwayState {
    Light { power: Power },
    Gas { valve: Valve },
}

/// Away-mode controller. Read-only: it is exposed as a binary sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwayPacket {
    pub header: Header,
    pub state: AwayState,
}

impl AwayPacket {
    pub fn kind(&self) -> DeviceKind {
        match self.state {
            AwayState::Light { .. } => DeviceKind::AwayLight,
            AwayState::Gas { .. } => DeviceKind::AwayGas,
        }
    }

    pub fn identity(&self) -> Identity {
        self.header.identity(self.kind())
    }

    pub fn is_on(&self) -> bool {
        match self.state {
            AwayState::Light { power } => power == Power::On,
            AwayState::Gas { valve } => valve == Valve::Open,
        }
    }

    pub(crate) fn parse(kind: DeviceKind, header: Header, data: &[u8]) -> Result<Self, DecodeError> {
        let state = match kind {
            DeviceKind::AwayGas => AwayState::Gas {
                valve: Valve::from_byte(data[0])?,
            },
            _ => AwayState::Light {
                power: Power::from_byte(data[0])?,
            },
        };
        Ok(Self { header, state })
    }

    pub(crate) fn data(&self) -> Vec<u8> {
        let value = match self.state {
            AwayState::Light { power } => power.as_byte(),
            AwayState::Gas { valve } => valve.as_byte(),
        };
        vec![value, 0x00]
    }
}
