use log::*;

use crate::{
    driver::BlockDriver,
    protocol::{
        Request, CapacityError, Status,
        bridge::{GetProtocolVersion, Delay},
        i2c::{self, ClockSpeed},
        },
    transport::{Message, Link, MessageHandler},
    };
use super::{Error, decode_response};


/// outbound request decided by a conversation step
#[derive(Clone, Debug, PartialEq)]
pub struct Outbound {
    pub component: u8,
    pub operation: u8,
    pub channel: u8,
    pub payload: heapless::Vec<u8, 64>,
}
impl Outbound {
    pub fn request<R: Request>(channel: u8, request: &R) -> Result<Self, CapacityError> {
        let mut payload = heapless::Vec::new();
        payload.resize_default(payload.capacity()).map_err(|_| CapacityError)?;
        let size = request.encode(&mut payload)?;
        payload.truncate(size);
        Ok(Self {
            component: R::COMPONENT.into(),
            operation: R::OPERATION,
            channel,
            payload,
        })
    }
}

/**
    sequence of requests where each one depends on the previous response

    a conversation is a sum type of its steps. [Conversation::transition] consumes the current step and the inbound response, and gives the next step with the request to send next, if any. The first transition is given no inbound message and opens the conversation
*/
pub trait Conversation: Sized {
    fn transition(self, inbound: Option<&Message<'_>>) -> (Self, Option<Outbound>);
    /// no more request will be sent
    fn is_finished(&self) -> bool;
}

/**
    transport handler running a conversation

    requests are sent from the transport callbacks as soon as a response arrives, so any loop polling the transport or reacting to its readiness can host it. A request decided while the link is still sending waits for the end of that emission. A request that cannot be sent stops the conversation
*/
pub struct Exchange<C> {
    step: Option<C>,
    /// request waiting for the link to be free
    pending: Option<Outbound>,
    failed: bool,
}
impl<C: Conversation> Exchange<C> {
    pub fn new(initial: C) -> Self {
        Self {step: Some(initial), pending: None, failed: false}
    }
    /// current step of the conversation
    pub fn step(&self) -> Option<&C> {self.step.as_ref()}
    pub fn is_finished(&self) -> bool {
        self.failed || self.step.as_ref().is_none_or(C::is_finished)
    }
    /// a request could not be sent
    pub fn is_failed(&self) -> bool {self.failed}
    /// send the opening request, this is to be called once with the transport's link
    pub fn start<D: BlockDriver, const N: usize>(&mut self, link: &mut Link<D, N>) {
        self.advance(None, link)
    }
    fn advance<D: BlockDriver, const N: usize>(&mut self, inbound: Option<&Message<'_>>, link: &mut Link<D, N>) {
        let Some(step) = self.step.take()
            else {return};
        let (next, outbound) = step.transition(inbound);
        self.step = Some(next);
        if let Some(outbound) = outbound {
            if self.pending.replace(outbound).is_some() {
                warn!("conversation request replaced before being sent");
            }
            self.flush(link);
        }
    }
    fn flush<D: BlockDriver, const N: usize>(&mut self, link: &mut Link<D, N>) {
        if self.pending.is_none()
            {return}
        if link.is_busy() {
            debug!("conversation request waits for the link");
            return
        }
        let Some(outbound) = self.pending.take()
            else {return};
        if let Err(error) = link.send_message(outbound.component, outbound.operation, outbound.channel, &outbound.payload) {
            warn!("conversation request not sent: {}", error);
            self.failed = true;
        }
    }
}
impl<C: Conversation, D: BlockDriver, const N: usize> MessageHandler<D, N> for Exchange<C> {
    fn on_message(&mut self, message: &Message<'_>, link: &mut Link<D, N>) {
        if self.is_finished() {
            warn!("message {:?} after end of conversation, ignored", message.header());
            return
        }
        self.advance(Some(message), link)
    }
    fn on_sent(&mut self, link: &mut Link<D, N>) {
        self.flush(link)
    }
}


/// I2C address of the BH1750 ambient light sensor
pub const LUX_SENSOR: u16 = 0x23;
/// BH1750 one time measurement in high resolution mode
const LUX_ONE_TIME_HIGH_RESOLUTION: u8 = 0x23;
/// BH1750 maximum measurement time
const LUX_MEASUREMENT_MS: u32 = 30;

/**
    read a BH1750 ambient light sensor through the bridge

    check the protocol version, configure the I2C port, start a measurement, wait for it, then read the 2 bytes result. Each variant is the response being waited for
*/
#[derive(Clone, Debug, PartialEq)]
pub enum LuxReading {
    Start {channel: u8},
    Version {channel: u8},
    Configured {channel: u8},
    Measuring {channel: u8},
    Delayed {channel: u8},
    Reading {channel: u8},
    /// illuminance in lux
    Done(f32),
    Failed(LuxFailure),
}
/// reason of a failed lux reading
#[derive(Clone, Debug, PartialEq)]
pub enum LuxFailure {
    /// bridge answered with a non ok status
    Status(Status),
    /// response could not be understood
    Malformed,
    /// request could not be encoded
    Capacity,
}

impl LuxReading {
    pub fn new(channel: u8) -> Self {
        Self::Start {channel}
    }
    /// illuminance from the 2 bytes of a measurement
    pub fn lux(raw: [u8; 2]) -> f32 {
        f32::from(u16::from_be_bytes(raw)) / 1.2
    }
}

impl Conversation for LuxReading {
    fn transition(self, inbound: Option<&Message<'_>>) -> (Self, Option<Outbound>) {
        match (self, inbound) {
            (Self::Start {channel}, None) => {
                send(Self::Version {channel}, Outbound::request(0, &GetProtocolVersion))
            },
            (Self::Version {channel}, Some(message)) => match decode_response::<GetProtocolVersion>(message) {
                Ok(version) => {
                    info!("bridge protocol version {:#x}", version.version);
                    send(Self::Configured {channel}, Outbound::request(channel, &i2c::Config::new(ClockSpeed::Khz100, true)))
                },
                Err(error) => fail(error),
            },
            (Self::Configured {channel}, Some(message)) => match decode_response::<i2c::Config>(message) {
                Ok(()) => send(
                    Self::Measuring {channel},
                    Outbound::request(channel, &i2c::Write {address: LUX_SENSOR, data: &[LUX_ONE_TIME_HIGH_RESOLUTION]}),
                    ),
                Err(error) => fail(error),
            },
            (Self::Measuring {channel}, Some(message)) => match decode_response::<i2c::Write>(message) {
                Ok(_) => send(Self::Delayed {channel}, Outbound::request(0, &Delay {milliseconds: LUX_MEASUREMENT_MS})),
                Err(error) => fail(error),
            },
            (Self::Delayed {channel}, Some(message)) => match decode_response::<Delay>(message) {
                Ok(()) => send(Self::Reading {channel}, Outbound::request(channel, &i2c::Read {address: LUX_SENSOR, num_bytes: 2})),
                Err(error) => fail(error),
            },
            (Self::Reading {..}, Some(message)) => match decode_response::<i2c::Read>(message) {
                Ok(read) => match <[u8; 2]>::try_from(read.data) {
                    Ok(raw) => (Self::Done(Self::lux(raw)), None),
                    Err(_) => (Self::Failed(LuxFailure::Malformed), None),
                },
                Err(error) => fail(error),
            },
            // nothing to do until a response arrives, or after the end
            (step, _) => (step, None),
        }
    }
    fn is_finished(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Failed(_))
    }
}

fn send(next: LuxReading, outbound: Result<Outbound, CapacityError>) -> (LuxReading, Option<Outbound>) {
    match outbound {
        Ok(outbound) => (next, Some(outbound)),
        Err(_) => (LuxReading::Failed(LuxFailure::Capacity), None),
    }
}
fn fail(error: Error) -> (LuxReading, Option<Outbound>) {
    warn!("lux reading failed: {}", error);
    let failure = match error {
        Error::Status(status) => LuxFailure::Status(status),
        _ => LuxFailure::Malformed,
    };
    (LuxReading::Failed(failure), None)
}
