use std::{string::{String, ToString}, vec::Vec};

use crate::{
    driver::BlockDriver,
    protocol::{
        Component,
        bridge::{GetProtocolVersion, GetHardwareInfo, GetFirmwareVersion, GetSupportedComponents, Delay},
        i2c,
        spi,
        },
    };
use super::{Error, Client, decode_response};


/// channel of the bridge component, it has only one
const BRIDGE: u8 = 0;


impl<D, const N: usize> Client<D, N>
where
    D: BlockDriver,
    D::Error: Into<Error>,
{
    /// version of the protocol implemented by the bridge
    pub fn protocol_version(&mut self) -> Result<u8, Error> {
        let response = self.call(BRIDGE, &GetProtocolVersion)?;
        Ok(decode_response::<GetProtocolVersion>(&response.as_message())?.version)
    }
    /// human readable description of the bridge hardware
    pub fn hardware_info(&mut self) -> Result<String, Error> {
        let response = self.call(BRIDGE, &GetHardwareInfo)?;
        Ok(decode_response::<GetHardwareInfo>(&response.as_message())?.description.to_string())
    }
    pub fn firmware_version(&mut self) -> Result<u8, Error> {
        let response = self.call(BRIDGE, &GetFirmwareVersion)?;
        Ok(decode_response::<GetFirmwareVersion>(&response.as_message())?.version)
    }
    /// components served by the bridge
    pub fn supported_components(&mut self) -> Result<Vec<Component>, Error> {
        let response = self.call(BRIDGE, &GetSupportedComponents)?;
        Ok(decode_response::<GetSupportedComponents>(&response.as_message())?.iter().collect())
    }
    /// make the bridge wait, it answers once the delay elapsed
    pub fn delay(&mut self, milliseconds: u32) -> Result<(), Error> {
        let request = Delay {milliseconds};
        let response = self.call(BRIDGE, &request)?;
        decode_response::<Delay>(&response.as_message())
    }

    pub fn i2c_config(&mut self, channel: u8, clock_speed: i2c::ClockSpeed, pullups: bool) -> Result<(), Error> {
        let request = i2c::Config::new(clock_speed, pullups);
        let response = self.call(channel, &request)?;
        decode_response::<i2c::Config>(&response.as_message())
    }
    pub fn i2c_write(&mut self, channel: u8, address: u16, data: &[u8]) -> Result<(), Error> {
        let request = i2c::Write {address, data};
        let response = self.call(channel, &request)?;
        let written = decode_response::<i2c::Write>(&response.as_message())?;
        if written.address != address
            {return Err(Error::Host("response address mismatch"))}
        Ok(())
    }
    pub fn i2c_read(&mut self, channel: u8, address: u16, num_bytes: u8) -> Result<Vec<u8>, Error> {
        let request = i2c::Read {address, num_bytes};
        let response = self.call(channel, &request)?;
        let read = decode_response::<i2c::Read>(&response.as_message())?;
        if read.address != address
            {return Err(Error::Host("response address mismatch"))}
        if read.data.len() != usize::from(num_bytes)
            {return Err(Error::Host("response size mismatch"))}
        Ok(read.data.to_vec())
    }

    /// number of SPI ports of the bridge
    pub fn spi_channels(&mut self) -> Result<u8, Error> {
        let response = self.call(0, &spi::GetChannels)?;
        Ok(decode_response::<spi::GetChannels>(&response.as_message())?.count)
    }
    pub fn spi_config(&mut self, channel: u8, config: &spi::Config) -> Result<(), Error> {
        let response = self.call(channel, config)?;
        decode_response::<spi::Config>(&response.as_message())
    }
    pub fn spi_read(&mut self, channel: u8, num_bytes: u16) -> Result<Vec<u8>, Error> {
        let response = self.call(channel, &spi::Read {num_bytes})?;
        let read = decode_response::<spi::Read>(&response.as_message())?;
        if read.data.len() != usize::from(num_bytes)
            {return Err(Error::Host("response size mismatch"))}
        Ok(read.data.to_vec())
    }
    pub fn spi_write(&mut self, channel: u8, data: &[u8]) -> Result<(), Error> {
        let response = self.call(channel, &spi::Write {data})?;
        decode_response::<spi::Write>(&response.as_message())
    }
    /// send `data` while receiving as many bytes
    pub fn spi_transfer(&mut self, channel: u8, data: &[u8]) -> Result<Vec<u8>, Error> {
        let response = self.call(channel, &spi::Transfer {data})?;
        let received = decode_response::<spi::Transfer>(&response.as_message())?;
        if received.data.len() != data.len()
            {return Err(Error::Host("response size mismatch"))}
        Ok(received.data.to_vec())
    }
}
