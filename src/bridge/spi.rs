use embedded_hal::spi::{SpiDevice, Mode, Polarity, Phase};
use log::*;

use crate::{
    dispatch::{Component, Outcome, Reply},
    protocol::{
        Decode, Status, CapacityError,
        spi::{self as op, BitOrder, Config, Read, DATA_BITS},
        },
    transport::Message,
    };


/// settings of a SPI port, as requested by the host
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SpiSettings {
    /// word size in bits
    pub data_bits: u8,
    pub bit_order: BitOrder,
    pub mode: Mode,
    /// clock frequency in Hz
    pub frequency: u32,
}
impl SpiSettings {
    /// validate a configuration request
    pub fn from_config(config: &Config) -> Option<Self> {
        if !DATA_BITS.contains(&config.data_bits)
        || config.bit_order == BitOrder::Invalid
        || config.baud_rate == 0
            {return None}
        Some(Self {
            data_bits: config.data_bits,
            bit_order: config.bit_order,
            mode: Mode {
                polarity: match config.cpol {
                    0 => Polarity::IdleLow,
                    1 => Polarity::IdleHigh,
                    _ => return None,
                },
                phase: match config.cpha {
                    0 => Phase::CaptureOnFirstTransition,
                    1 => Phase::CaptureOnSecondTransition,
                    _ => return None,
                },
            },
            frequency: config.baud_rate,
        })
    }
}

/// SPI device that can be reconfigured at runtime
pub trait ConfigurableSpi: SpiDevice<u8> {
    fn configure(&mut self, settings: &SpiSettings) -> Result<(), Self::Error>;
}

/// SPI master component, channel `i` of requests is port `i`
pub struct SpiMaster<P, const K: usize = 1> {
    ports: [P; K],
}
impl<P: ConfigurableSpi, const K: usize> SpiMaster<P, K> {
    pub fn new(ports: [P; K]) -> Self {
        Self {ports}
    }
    pub fn port(&self, channel: u8) -> Option<&P> {
        self.ports.get(usize::from(channel))
    }
    fn port_mut(&mut self, channel: u8) -> Option<&mut P> {
        self.ports.get_mut(usize::from(channel))
    }

    fn config(&mut self, channel: u8, payload: &[u8]) -> Status {
        let (Some(port), Some(settings)) = (
            self.ports.get_mut(usize::from(channel)),
            Config::decode(payload).ok().as_ref().and_then(SpiSettings::from_config),
            )
            else {return Status::InvalidArguments};
        debug!("configure spi port {} with {:?}", channel, settings);
        to_status(port.configure(&settings))
    }
}

impl<P: ConfigurableSpi, const K: usize> Component for SpiMaster<P, K> {
    fn handle(&mut self, request: &Message<'_>, reply: &mut Reply<'_>) -> Result<Outcome, CapacityError> {
        match request.operation {
            op::GET_NUM_CHANNELS => {
                reply.status(Status::Ok)?.pack(u8::try_from(K).unwrap_or(u8::MAX))?;
            },
            op::CONFIG => {
                let status = self.config(request.channel, request.payload);
                reply.status(status)?;
            },
            op::WRITE => {
                let status = match self.port_mut(request.channel) {
                    Some(port) => to_status(port.write(request.payload)),
                    None => Status::InvalidArguments,
                };
                reply.status(status)?;
            },
            op::READ => {
                let size = match Read::decode(request.payload) {
                    Ok(read) => usize::from(read.num_bytes),
                    Err(_) => {
                        reply.status(Status::InvalidArguments)?;
                        return Ok(Outcome::Replied);
                    },
                };
                // data is read in place, right after the status
                reply.status(Status::Ok)?;
                let status = match (self.ports.get_mut(usize::from(request.channel)), reply.remaining().get_mut(.. size)) {
                    (Some(port), Some(data)) => to_status(port.read(data)),
                    _ => Status::InvalidArguments,
                };
                conclude(reply, status, size)?;
            },
            op::TRANSFER => {
                let size = request.payload.len();
                reply.status(Status::Ok)?;
                let status = match (self.ports.get_mut(usize::from(request.channel)), reply.remaining().get_mut(.. size)) {
                    (Some(port), Some(data)) => {
                        data.copy_from_slice(request.payload);
                        to_status(port.transfer_in_place(data))
                    },
                    _ => Status::InvalidArguments,
                };
                conclude(reply, status, size)?;
            },
            _ => return Ok(Outcome::NotImplemented),
        }
        Ok(Outcome::Replied)
    }
}

/// keep the data written in place if successful, otherwise only report the status
fn conclude(reply: &mut Reply<'_>, status: Status, size: usize) -> Result<(), CapacityError> {
    if status == Status::Ok {
        reply.advance(size)?;
    }
    else {
        reply.clear();
        reply.status(status)?;
    }
    Ok(())
}
fn to_status<E: embedded_hal::spi::Error>(result: Result<(), E>) -> Status {
    match result {
        Ok(()) => Status::Ok,
        Err(error) => {
            warn!("spi failure: {:?}", error);
            Status::UnknownError
        },
    }
}
