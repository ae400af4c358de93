use embedded_hal::i2c::{self as hal, I2c, SevenBitAddress};
use log::*;

use crate::{
    dispatch::{Component, Outcome, Reply},
    protocol::{
        Decode, Status, CapacityError,
        i2c::{self as op, Config, Write, Read},
        },
    transport::Message,
    };


/// I2C bus that can be reconfigured at runtime
pub trait ConfigurableI2c: I2c<SevenBitAddress> {
    /// set the bus clock frequency in Hz and the internal pull-ups
    fn configure(&mut self, frequency: u32, sda_pullup: bool, scl_pullup: bool) -> Result<(), Self::Error>;
}

/// I2C master component, channel `i` of requests is port `i`
pub struct I2cMaster<P, const K: usize = 1> {
    ports: [P; K],
}
impl<P: ConfigurableI2c, const K: usize> I2cMaster<P, K> {
    pub fn new(ports: [P; K]) -> Self {
        Self {ports}
    }
    pub fn port(&self, channel: u8) -> Option<&P> {
        self.ports.get(usize::from(channel))
    }

    fn config(&mut self, channel: u8, payload: &[u8]) -> Status {
        let Some(port) = self.ports.get_mut(usize::from(channel))
            else {return Status::InvalidArguments};
        let Ok(config) = Config::decode(payload)
            else {return Status::InvalidArguments};
        let Some(frequency) = config.clock_speed.frequency()
            else {return Status::InvalidArguments};
        debug!("configure i2c port {} at {} Hz", channel, frequency);
        match port.configure(frequency, config.sda_pullup != 0, config.scl_pullup != 0) {
            Ok(()) => Status::Ok,
            Err(error) => failure(&error),
        }
    }
    fn write(&mut self, channel: u8, request: &Write<'_>) -> Status {
        let (Some(port), Some(address)) = (self.ports.get_mut(usize::from(channel)), seven_bits(request.address))
            else {return Status::InvalidArguments};
        match port.write(address, request.data) {
            Ok(()) => Status::Ok,
            Err(error) => failure(&error),
        }
    }
    fn read(&mut self, channel: u8, request: &Read, data: Option<&mut [u8]>) -> Status {
        let (Some(port), Some(address), Some(data)) = (self.ports.get_mut(usize::from(channel)), seven_bits(request.address), data)
            else {return Status::InvalidArguments};
        match port.read(address, data) {
            Ok(()) => Status::Ok,
            Err(error) => failure(&error),
        }
    }
}

impl<P: ConfigurableI2c, const K: usize> Component for I2cMaster<P, K> {
    fn handle(&mut self, request: &Message<'_>, reply: &mut Reply<'_>) -> Result<Outcome, CapacityError> {
        match request.operation {
            op::CONFIG => {
                let status = self.config(request.channel, request.payload);
                reply.status(status)?;
            },
            op::WRITE => match Write::decode(request.payload) {
                Ok(write) => {
                    let status = self.write(request.channel, &write);
                    reply.status(status)?.pack(write.address)?;
                },
                Err(_) => {reply.status(Status::InvalidArguments)?;},
            },
            op::READ => match Read::decode(request.payload) {
                Ok(read) => {
                    // data is read in place, right after the status and address
                    reply.status(Status::Ok)?.pack(read.address)?;
                    let size = usize::from(read.num_bytes);
                    let status = self.read(request.channel, &read, reply.remaining().get_mut(.. size));
                    if status == Status::Ok {
                        reply.advance(size)?;
                    }
                    else {
                        reply.clear();
                        reply.status(status)?.pack(read.address)?;
                    }
                },
                Err(_) => {reply.status(Status::InvalidArguments)?;},
            },
            _ => return Ok(Outcome::NotImplemented),
        }
        Ok(Outcome::Replied)
    }
}

fn seven_bits(address: u16) -> Option<SevenBitAddress> {
    u8::try_from(address).ok().filter(|address| *address <= 0x7f)
}
/// status reporting an I2C error
fn failure<E: hal::Error>(error: &E) -> Status {
    warn!("i2c failure: {:?}", error);
    match error.kind() {
        hal::ErrorKind::NoAcknowledge(_) => Status::SlaveNotConnected,
        _ => Status::UnknownError,
    }
}
