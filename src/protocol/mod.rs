/*!
    identifiers, status codes and payload layouts of the MultiBus protocol

    every operation is a pair of a request and a response payload. A request type implements [Request], which binds it to its component, operation and response type.

    every response payload starts with a [Status] byte, the payload layout defined by the response types is what follows this byte. The body of a response is meaningless unless its status is [Status::Ok]
*/

use bilge::prelude::*;
use packbytes::{FromBytes, ToBytes, ByteArray};
use thiserror::Error;

use crate::pack_enum;

/// operations of the bridge itself
pub mod bridge;
/// operations of I2C master ports
pub mod i2c;
/// operations of SPI master ports
pub mod spi;


/// version of the protocol implemented by this crate
pub const PROTOCOL_VERSION: u8 = 1;
/// bit set in the operation of a response
pub const RESPONSE: u8 = 0x80;

/// operation identifier of the response to the given request operation
pub const fn response(operation: u8) -> u8 {
    operation | RESPONSE
}

/// component identifiers
#[bitsize(8)]
#[derive(Copy, Clone, FromBits, Debug, PartialEq)]
pub enum Component {
    /// the bridge itself: version, hardware info, delays
    Bridge = 0x00,
    I2cMaster = 0x01,
    SpiMaster = 0x02,
    #[fallback]
    Unknown = 0xff,
}

/// status of an executed request, first byte of every response
#[bitsize(8)]
#[derive(Copy, Clone, Default, FromBits, Debug, PartialEq)]
pub enum Status {
    #[default]
    Ok = 0x00,
    /// request arguments are not valid for this component or channel
    InvalidArguments = 0x02,
    /// addressed I2C slave did not acknowledge
    SlaveNotConnected = 0x03,
    /// any other failure, also used for status codes unknown to this crate
    #[fallback]
    UnknownError = 0x01,
}
pack_enum!(Status);


/// buffer capacity is not sufficient for the data to write
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
#[error("capacity exceeded")]
pub struct CapacityError;

/// payload could not be decoded
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("payload truncated, expected {expected} bytes but got {actual}")]
    Truncated {expected: usize, actual: usize},
    #[error("invalid payload: {0}")]
    Invalid(&'static str),
}

/// serialization of a payload
pub trait Encode {
    /// write the payload at the start of `buffer`, return the number of bytes written
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, CapacityError>;
}
/// deserialization of a payload, possibly borrowing variable-length parts
pub trait Decode<'a>: Sized {
    fn decode(data: &'a [u8]) -> Result<Self, DecodeError>;
}

/// request payload, bound to its operation
pub trait Request: Encode {
    const COMPONENT: Component;
    const OPERATION: u8;
    /// body of the response, following the status byte
    type Response<'a>: Decode<'a>;
}

/// split a response payload into its status and its body
pub fn split_status(payload: &[u8]) -> Result<(Status, &[u8]), DecodeError> {
    let mut reader = Reader::new(payload);
    let status = reader.unpack::<Status>()?;
    Ok((status, reader.rest()))
}


/// cursor writing a payload into a bounded buffer
pub struct Writer<'b> {
    buffer: &'b mut [u8],
    len: usize,
}
impl<'b> Writer<'b> {
    pub fn new(buffer: &'b mut [u8]) -> Self {
        Self {buffer, len: 0}
    }
    /// number of bytes written so far
    pub fn len(&self) -> usize {self.len}
    pub fn is_empty(&self) -> bool {self.len == 0}
    /// bytes written so far
    pub fn written(&self) -> &[u8] {&self.buffer[.. self.len]}
    /// forget everything written
    pub fn clear(&mut self) {self.len = 0}

    /// append raw bytes
    pub fn put(&mut self, bytes: &[u8]) -> Result<&mut Self, CapacityError> {
        self.remaining()
            .get_mut(.. bytes.len())
            .ok_or(CapacityError)?
            .copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(self)
    }
    /// append a big endian packed value
    pub fn pack<T: ToBytes>(&mut self, value: T) -> Result<&mut Self, CapacityError> {
        self.put(value.to_be_bytes().as_ref())
    }
    /// append an encoded payload
    pub fn encode<T: Encode + ?Sized>(&mut self, value: &T) -> Result<&mut Self, CapacityError> {
        let size = value.encode(self.remaining())?;
        self.len += size;
        Ok(self)
    }
    /// space left after the written bytes, to be filled in place before calling [Self::advance]
    pub fn remaining(&mut self) -> &mut [u8] {
        &mut self.buffer[self.len ..]
    }
    /// mark `size` more bytes of [Self::remaining] as written
    pub fn advance(&mut self, size: usize) -> Result<&mut Self, CapacityError> {
        if size > self.buffer.len() - self.len
            {return Err(CapacityError)}
        self.len += size;
        Ok(self)
    }
}

/// cursor reading a payload
pub struct Reader<'a> {
    data: &'a [u8],
}
impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {data}
    }
    /// consume a big endian packed value
    pub fn unpack<T: FromBytes>(&mut self) -> Result<T, DecodeError> {
        let size = T::Bytes::SIZE;
        if self.data.len() < size
            {return Err(DecodeError::Truncated {expected: size, actual: self.data.len()})}
        let mut bytes = T::Bytes::zeroed();
        bytes.as_mut().copy_from_slice(&self.data[.. size]);
        self.data = &self.data[size ..];
        Ok(T::from_be_bytes(bytes))
    }
    /// consume all the remaining bytes
    pub fn rest(&mut self) -> &'a [u8] {
        core::mem::take(&mut self.data)
    }
}


/// payload with nothing but its status, or request without arguments
impl Encode for () {
    fn encode(&self, _buffer: &mut [u8]) -> Result<usize, CapacityError> {Ok(0)}
}
impl Decode<'_> for () {
    fn decode(_data: &[u8]) -> Result<Self, DecodeError> {Ok(())}
}

/// implement [Encode] and [Decode] for packbytes structs of fixed size
macro_rules! fixed_payload {
    ($($t:ty),* $(,)?) => {$(
        impl $crate::protocol::Encode for $t {
            fn encode(&self, buffer: &mut [u8]) -> Result<usize, $crate::protocol::CapacityError> {
                let mut writer = $crate::protocol::Writer::new(buffer);
                writer.pack(*self)?;
                Ok(writer.len())
            }
        }
        impl $crate::protocol::Decode<'_> for $t {
            fn decode(data: &[u8]) -> Result<Self, $crate::protocol::DecodeError> {
                $crate::protocol::Reader::new(data).unpack()
            }
        }
    )*};
}
/// implement [Encode] and [Decode] for unit structs of requests without arguments
macro_rules! empty_payload {
    ($($t:ty),* $(,)?) => {$(
        impl $crate::protocol::Encode for $t {
            fn encode(&self, _buffer: &mut [u8]) -> Result<usize, $crate::protocol::CapacityError> {Ok(0)}
        }
        impl $crate::protocol::Decode<'_> for $t {
            fn decode(_data: &[u8]) -> Result<Self, $crate::protocol::DecodeError> {Ok(Self)}
        }
    )*};
}
pub(crate) use fixed_payload;
pub(crate) use empty_payload;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(u8::from(Status::Ok), 0);
        assert_eq!(u8::from(Status::UnknownError), 1);
        assert_eq!(Status::from(2u8), Status::InvalidArguments);
        assert_eq!(Status::from(3u8), Status::SlaveNotConnected);
        // codes this crate does not know are reported as unknown errors
        assert_eq!(Status::from(0x42u8), Status::UnknownError);
        assert_eq!(Status::default(), Status::Ok);
    }

    #[test]
    fn component_identifiers() {
        assert_eq!(u8::from(Component::Bridge), 0);
        assert_eq!(Component::from(1u8), Component::I2cMaster);
        assert_eq!(Component::from(2u8), Component::SpiMaster);
        assert_eq!(Component::from(0x42u8), Component::Unknown);
        assert_eq!(response(0x02), 0x82);
    }

    #[test]
    fn writer_bounds() {
        let mut buffer = [0; 4];
        let mut writer = Writer::new(&mut buffer);
        writer.pack(0x0102u16).unwrap().put(&[3]).unwrap();
        assert_eq!(writer.written(), &[1, 2, 3]);
        assert_eq!(writer.put(&[4, 5]).err(), Some(CapacityError));
        // a failed write leaves the written bytes untouched
        assert_eq!(writer.len(), 3);
        assert_eq!(writer.advance(2).err(), Some(CapacityError));
        writer.remaining()[0] = 4;
        writer.advance(1).unwrap();
        assert_eq!(writer.written(), &[1, 2, 3, 4]);
    }

    #[test]
    fn reader_truncation() {
        let mut reader = Reader::new(&[0x00, 0x23]);
        assert_eq!(reader.unpack::<u8>(), Ok(0));
        assert_eq!(reader.unpack::<u16>(), Err(DecodeError::Truncated {expected: 2, actual: 1}));
        assert_eq!(reader.rest(), &[0x23]);
        assert_eq!(reader.rest(), &[] as &[u8]);
    }

    #[test]
    fn status_split() {
        assert_eq!(split_status(&[0x00, 0x01]), Ok((Status::Ok, &[0x01][..])));
        assert_eq!(split_status(&[0x03]), Ok((Status::SlaveNotConnected, &[][..])));
        assert!(split_status(&[]).is_err());
    }
}
