use packbytes::{FromBytes, ToBytes};

use super::{
    Component, Request, Encode, Decode, Writer,
    CapacityError, DecodeError,
    fixed_payload, empty_payload,
    };


pub const GET_PROTOCOL_VERSION: u8 = 0x00;
pub const GET_HARDWARE_INFO: u8 = 0x01;
pub const GET_FIRMWARE_VERSION: u8 = 0x02;
pub const GET_SUPPORTED_COMPONENTS: u8 = 0x03;
pub const DELAY: u8 = 0x04;


/// ask for the protocol version implemented by the bridge
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct GetProtocolVersion;
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, PartialEq)]
pub struct ProtocolVersion {
    pub version: u8,
}

/// ask for a human readable description of the bridge hardware
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct GetHardwareInfo;
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HardwareInfo<'a> {
    pub description: &'a str,
}

/// ask for the version of the firmware running on the bridge
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct GetFirmwareVersion;
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, PartialEq)]
pub struct FirmwareVersion {
    pub version: u8,
}

/// ask for the components the bridge can serve
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct GetSupportedComponents;
/// list of component identifiers, one byte each
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SupportedComponents<'a> {
    pub components: &'a [u8],
}
impl SupportedComponents<'_> {
    pub fn iter(&self) -> impl Iterator<Item=Component> + '_ {
        self.components.iter().map(|&id| Component::from(id))
    }
    pub fn contains(&self, component: Component) -> bool {
        self.components.contains(&u8::from(component))
    }
}

/// make the bridge wait before answering, useful to give time to a peripheral between two requests
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, PartialEq)]
pub struct Delay {
    pub milliseconds: u32,
}


empty_payload!(GetProtocolVersion, GetHardwareInfo, GetFirmwareVersion, GetSupportedComponents);
fixed_payload!(ProtocolVersion, FirmwareVersion, Delay);

impl Encode for HardwareInfo<'_> {
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, CapacityError> {
        Ok(Writer::new(buffer).put(self.description.as_bytes())?.len())
    }
}
impl<'a> Decode<'a> for HardwareInfo<'a> {
    fn decode(data: &'a [u8]) -> Result<Self, DecodeError> {
        core::str::from_utf8(data)
            .map(|description| Self {description})
            .map_err(|_| DecodeError::Invalid("hardware info is not utf-8"))
    }
}

impl Encode for SupportedComponents<'_> {
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, CapacityError> {
        Ok(Writer::new(buffer).put(self.components)?.len())
    }
}
impl<'a> Decode<'a> for SupportedComponents<'a> {
    fn decode(data: &'a [u8]) -> Result<Self, DecodeError> {
        Ok(Self {components: data})
    }
}


impl Request for GetProtocolVersion {
    const COMPONENT: Component = Component::Bridge;
    const OPERATION: u8 = GET_PROTOCOL_VERSION;
    type Response<'r> = ProtocolVersion;
}
impl Request for GetHardwareInfo {
    const COMPONENT: Component = Component::Bridge;
    const OPERATION: u8 = GET_HARDWARE_INFO;
    type Response<'r> = HardwareInfo<'r>;
}
impl Request for GetFirmwareVersion {
    const COMPONENT: Component = Component::Bridge;
    const OPERATION: u8 = GET_FIRMWARE_VERSION;
    type Response<'r> = FirmwareVersion;
}
impl Request for GetSupportedComponents {
    const COMPONENT: Component = Component::Bridge;
    const OPERATION: u8 = GET_SUPPORTED_COMPONENTS;
    type Response<'r> = SupportedComponents<'r>;
}
impl Request for Delay {
    const COMPONENT: Component = Component::Bridge;
    const OPERATION: u8 = DELAY;
    type Response<'r> = ();
}
