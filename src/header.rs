use packbytes::{FromBytes, ToBytes, ByteArray};


/// default maximum size of a frame, header included
pub const MAX_FRAME: usize = 1024;
/// size of a serialized [Header]
pub const HEADER_SIZE: usize = <Header as FromBytes>::Bytes::SIZE;

/// frame header, preceding every message payload on the wire
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, Default, PartialEq, Eq)]
pub struct Header {
    /// component the message is addressed to, or originates from
    pub component: u8,
    /// operation in this component, responses have the [crate::protocol::RESPONSE] bit set
    pub operation: u8,
    /// instance of the component, when the bridge has several of them (ie. I2C port)
    pub channel: u8,
    /// number of payload bytes following this header
    pub payload_length: u16,
}

impl Header {
    /// decode a header from the first [HEADER_SIZE] bytes of `bytes`
    pub fn read(bytes: &[u8]) -> Self {
        let mut raw = <Self as FromBytes>::Bytes::zeroed();
        raw.as_mut().copy_from_slice(&bytes[.. HEADER_SIZE]);
        Self::from_be_bytes(raw)
    }
    /// encode this header in the first [HEADER_SIZE] bytes of `bytes`
    pub fn write(self, bytes: &mut [u8]) {
        bytes[.. HEADER_SIZE].copy_from_slice(self.to_be_bytes().as_ref());
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_layout() {
        assert_eq!(HEADER_SIZE, 5);

        let header = Header {component: 0x01, operation: 0x02, channel: 0x03, payload_length: 0x0405};
        let mut bytes = [0; HEADER_SIZE];
        header.write(&mut bytes);
        // length is big endian
        assert_eq!(bytes, [0x01, 0x02, 0x03, 0x04, 0x05]);
        assert_eq!(Header::read(&bytes), header);
    }
}
