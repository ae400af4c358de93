use bilge::prelude::*;
use packbytes::{FromBytes, ToBytes};

use crate::pack_enum;
use super::{
    Component, Request, Encode, Decode, Writer, Reader,
    CapacityError, DecodeError,
    fixed_payload,
    };


pub const CONFIG: u8 = 0x00;
pub const WRITE: u8 = 0x01;
pub const READ: u8 = 0x02;


/// I2C bus clock
#[bitsize(8)]
#[derive(Copy, Clone, FromBits, Debug, PartialEq)]
pub enum ClockSpeed {
    Khz100 = 0x01,
    Khz400 = 0x02,
    /// any value the bridge cannot configure
    #[fallback]
    Unsupported = 0x00,
}
pack_enum!(ClockSpeed);

impl ClockSpeed {
    /// bus frequency in Hz
    pub fn frequency(self) -> Option<u32> {
        match self {
            Self::Khz100 => Some(100_000),
            Self::Khz400 => Some(400_000),
            Self::Unsupported => None,
        }
    }
}


/// configure the I2C port of the request's channel
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, PartialEq)]
pub struct Config {
    pub clock_speed: ClockSpeed,
    /// nonzero to enable the internal pull-up on SDA
    pub sda_pullup: u8,
    /// nonzero to enable the internal pull-up on SCL
    pub scl_pullup: u8,
}
impl Config {
    pub fn new(clock_speed: ClockSpeed, pullups: bool) -> Self {
        Self {
            clock_speed,
            sda_pullup: pullups.into(),
            scl_pullup: pullups.into(),
        }
    }
}

/// write bytes to a slave
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Write<'a> {
    pub address: u16,
    pub data: &'a [u8],
}
/// body of a write response, the address is echoed
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, PartialEq)]
pub struct Written {
    pub address: u16,
}

/// read bytes from a slave
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, PartialEq)]
pub struct Read {
    pub address: u16,
    pub num_bytes: u8,
}
/// body of a read response, the address is echoed before the data read
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Data<'a> {
    pub address: u16,
    pub data: &'a [u8],
}


fixed_payload!(Config, Written, Read);

impl Encode for Write<'_> {
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, CapacityError> {
        Ok(Writer::new(buffer).pack(self.address)?.put(self.data)?.len())
    }
}
impl<'a> Decode<'a> for Write<'a> {
    fn decode(data: &'a [u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(data);
        Ok(Self {
            address: reader.unpack()?,
            data: reader.rest(),
        })
    }
}
impl Encode for Data<'_> {
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, CapacityError> {
        Ok(Writer::new(buffer).pack(self.address)?.put(self.data)?.len())
    }
}
impl<'a> Decode<'a> for Data<'a> {
    fn decode(data: &'a [u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(data);
        Ok(Self {
            address: reader.unpack()?,
            data: reader.rest(),
        })
    }
}


impl Request for Config {
    const COMPONENT: Component = Component::I2cMaster;
    const OPERATION: u8 = CONFIG;
    type Response<'r> = ();
}
impl Request for Write<'_> {
    const COMPONENT: Component = Component::I2cMaster;
    const OPERATION: u8 = WRITE;
    type Response<'r> = Written;
}
impl Request for Read {
    const COMPONENT: Component = Component::I2cMaster;
    const OPERATION: u8 = READ;
    type Response<'r> = Data<'r>;
}
