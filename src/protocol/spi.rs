use bilge::prelude::*;
use packbytes::{FromBytes, ToBytes};

use crate::pack_enum;
use super::{
    Component, Request, Encode, Decode, Writer,
    CapacityError, DecodeError,
    fixed_payload, empty_payload,
    };


pub const GET_NUM_CHANNELS: u8 = 0x00;
pub const CONFIG: u8 = 0x01;
pub const READ: u8 = 0x02;
pub const WRITE: u8 = 0x03;
pub const TRANSFER: u8 = 0x04;

/// valid range of word sizes
pub const DATA_BITS: core::ops::RangeInclusive<u8> = 4 ..= 16;


#[bitsize(8)]
#[derive(Copy, Clone, FromBits, Debug, PartialEq)]
pub enum BitOrder {
    MsbFirst = 0x00,
    LsbFirst = 0x01,
    #[fallback]
    Invalid = 0xff,
}
pack_enum!(BitOrder);


/// ask for the number of SPI ports, channels of this component are in `0 .. count`
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct GetChannels;
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, PartialEq)]
pub struct Channels {
    pub count: u8,
}

/// configure the SPI port of the request's channel
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, PartialEq)]
pub struct Config {
    /// word size, in [DATA_BITS]
    pub data_bits: u8,
    pub bit_order: BitOrder,
    /// clock polarity, 0 for idle low
    pub cpol: u8,
    /// clock phase, 0 to sample on the first edge
    pub cpha: u8,
    /// clock frequency in Hz
    pub baud_rate: u32,
}
impl Config {
    /// 8 bits words, most significant bit first, in the given SPI mode (0 to 3)
    pub fn mode(mode: u8, baud_rate: u32) -> Self {
        Self {
            data_bits: 8,
            bit_order: BitOrder::MsbFirst,
            cpol: (mode >> 1) & 1,
            cpha: mode & 1,
            baud_rate,
        }
    }
}

/// clock bytes in from the device, sending nothing meaningful
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, PartialEq)]
pub struct Read {
    pub num_bytes: u16,
}
/// clock bytes out to the device, ignoring what comes in
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Write<'a> {
    pub data: &'a [u8],
}
/// clock bytes out and in simultaneously, the response holds as many bytes as sent
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transfer<'a> {
    pub data: &'a [u8],
}
/// body of read and transfer responses
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Data<'a> {
    pub data: &'a [u8],
}


empty_payload!(GetChannels);
fixed_payload!(Channels, Config, Read);

/// implement payload traits for raw byte payloads
macro_rules! raw_payload {
    ($($t:ident),*) => {$(
        impl Encode for $t<'_> {
            fn encode(&self, buffer: &mut [u8]) -> Result<usize, CapacityError> {
                Ok(Writer::new(buffer).put(self.data)?.len())
            }
        }
        impl<'a> Decode<'a> for $t<'a> {
            fn decode(data: &'a [u8]) -> Result<Self, DecodeError> {
                Ok(Self {data})
            }
        }
    )*};
}
raw_payload!(Write, Transfer, Data);


impl Request for GetChannels {
    const COMPONENT: Component = Component::SpiMaster;
    const OPERATION: u8 = GET_NUM_CHANNELS;
    type Response<'r> = Channels;
}
impl Request for Config {
    const COMPONENT: Component = Component::SpiMaster;
    const OPERATION: u8 = CONFIG;
    type Response<'r> = ();
}
impl Request for Read {
    const COMPONENT: Component = Component::SpiMaster;
    const OPERATION: u8 = READ;
    type Response<'r> = Data<'r>;
}
impl Request for Write<'_> {
    const COMPONENT: Component = Component::SpiMaster;
    const OPERATION: u8 = WRITE;
    type Response<'r> = ();
}
impl Request for Transfer<'_> {
    const COMPONENT: Component = Component::SpiMaster;
    const OPERATION: u8 = TRANSFER;
    type Response<'r> = Data<'r>;
}
