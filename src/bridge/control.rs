use embedded_hal::delay::DelayNs;
use log::*;

use crate::{
    dispatch::{Component, Outcome, Reply},
    protocol::{
        self, Decode, Status, CapacityError, PROTOCOL_VERSION,
        bridge::{self as op, Delay},
        },
    transport::Message,
    };


/// static description of a bridge
#[derive(Copy, Clone, Debug)]
pub struct BridgeInfo<'a> {
    /// human readable hardware description
    pub hardware: &'a str,
    pub firmware_version: u8,
    /// components registered in the bridge's dispatcher
    pub components: &'a [protocol::Component],
}

/// the bridge component, answering about the bridge itself and performing delays
pub struct BridgeControl<'a, D> {
    info: BridgeInfo<'a>,
    delay: D,
}
impl<'a, D: DelayNs> BridgeControl<'a, D> {
    pub fn new(info: BridgeInfo<'a>, delay: D) -> Self {
        Self {info, delay}
    }
    pub fn info(&self) -> &BridgeInfo<'a> {&self.info}
}

impl<D: DelayNs> Component for BridgeControl<'_, D> {
    fn handle(&mut self, request: &Message<'_>, reply: &mut Reply<'_>) -> Result<Outcome, CapacityError> {
        match request.operation {
            op::GET_PROTOCOL_VERSION => {
                reply.status(Status::Ok)?.pack(PROTOCOL_VERSION)?;
            },
            op::GET_HARDWARE_INFO => {
                reply.status(Status::Ok)?.put(self.info.hardware.as_bytes())?;
            },
            op::GET_FIRMWARE_VERSION => {
                reply.status(Status::Ok)?.pack(self.info.firmware_version)?;
            },
            op::GET_SUPPORTED_COMPONENTS => {
                reply.status(Status::Ok)?;
                for &component in self.info.components {
                    reply.pack(u8::from(component))?;
                }
            },
            op::DELAY => match Delay::decode(request.payload) {
                Ok(Delay {milliseconds}) => {
                    debug!("delay {} ms", milliseconds);
                    self.delay.delay_ms(milliseconds);
                    reply.status(Status::Ok)?;
                },
                Err(error) => {
                    warn!("invalid delay request: {}", error);
                    reply.status(Status::InvalidArguments)?;
                },
            },
            _ => return Ok(Outcome::NotImplemented),
        }
        Ok(Outcome::Replied)
    }
}
