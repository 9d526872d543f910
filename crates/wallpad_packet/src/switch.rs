use serde::Serialize;

use crate::error::DecodeError;
use crate::kind::DeviceKind;
use crate::kind::Header;
use crate::kind::Identity;
use crate::value::Power;
use crate::value::Valve;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct OutletState {
    pub power: Power,
}

/// Switched wall outlet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutletPacket {
    pub header: Header,
    pub state: OutletState,
}

impl OutletPacket {
    pub fn identity(&self) -> Identity {
        self.header.identity(DeviceKind::Outlet)
    }

    pub fn is_on(&self) -> bool {
        self.state.power == Power::On
    }

    pub fn make_change_power(&self, power: Power) -> Self {
        Self {
            header: self.header.change(),
            state: OutletState { power },
        }
    }

    pub(crate) fn parse(header: Header, data: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            header,
            state: OutletState {
                power: Power::from_byte(data[0])?,
            },
        })
    }

    pub(crate) fn data(&self) -> Vec<u8> {
        vec![self.state.power.as_byte(), 0x00]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct GasState {
    pub valve: Valve,
}

/// Gas valve controller.
///
/// The valve can only be closed from the bus; opening it is a manual action
/// at the valve, so there is no change operation for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasPacket {
    pub header: Header,
    pub state: GasState,
}

impl GasPacket {
    pub fn identity(&self) -> Identity {
        self.header.identity(DeviceKind::Gas)
    }

    pub fn is_open(&self) -> bool {
        self.state.valve == Valve::Open
    }

    pub fn make_change_valve_close(&self) -> Self {
        Self {
            header: self.header.change(),
            state: GasState {
                valve: Valve::Closed,
            },
        }
    }

    pub(crate) fn parse(header: Header, data: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            header,
            state: GasState {
                valve: Valve::from_byte(data[0])?,
            },
        })
    }

    pub(crate) fn data(&self) -> Vec<u8> {
        vec![self.state.valve.as_byte(), 0x00]
    }
}
