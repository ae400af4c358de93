/*!
    host side of MultiBus, in `std` environment

    only one request is in flight at any time: a response is correlated to its request by position, so a new request is never sent before the previous response arrived or timed out.

    drive styles:

    - [Client] owns a polled transport, and offers a blocking [Client::call], its async counterpart [Client::call_async], and typed helpers for every known operation
    - [SerialClient] performs exchanges over a tokio stream, like a serial port opened with [open_serial]
    - [Exchange] runs a [Conversation] from inside the transport callbacks, for event loops where the next request is decided when the previous response arrives
*/

/// blocking and polling request/response correlation
mod client;
/// typed helpers for the known operations
mod accessing;
/// event driven request sequences
mod conversation;
/// tokio serial ports
mod serial;

pub use client::*;
pub use conversation::*;
pub use serial::*;

use core::convert::Infallible;
use std::{time::Duration, vec::Vec};
use thiserror::Error;

use crate::{
    protocol::{Request, Status, DecodeError, CapacityError, Decode, split_status},
    transport::Message,
    };


/// error regarding MultiBus exchanges
#[derive(Error, Debug)]
pub enum Error {
    #[error("problem with serial bus")]
    Bus(std::io::Error),
    #[error("problem detected on bridge side: {0:?}")]
    Status(Status),
    #[error("malformed response: {0}")]
    Decode(DecodeError),
    #[error("request does not fit in a frame")]
    Capacity,
    #[error("problem detected on host side: {0}")]
    Host(&'static str),
    #[error("no response arrived in expected time")]
    Timeout,
}
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Bus(error)
    }
}
impl From<DecodeError> for Error {
    fn from(error: DecodeError) -> Self {
        Self::Decode(error)
    }
}
impl From<CapacityError> for Error {
    fn from(_: CapacityError) -> Self {
        Self::Capacity
    }
}
impl From<Infallible> for Error {
    fn from(error: Infallible) -> Self {
        match error {}
    }
}


/// settings of host clients
#[derive(Copy, Clone, Debug)]
pub struct ClientConfig {
    /// maximum time between sending a request and receiving its response
    pub timeout: Duration,
    /// sleep between two polls making no progress, busy polling if `None`
    pub poll_interval: Option<Duration>,
    /// hexdump every frame to the log
    pub dump_messages: bool,
}
impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            poll_interval: Some(Duration::from_millis(1)),
            dump_messages: false,
        }
    }
}


/// message copied out of the transport's receive buffer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedMessage {
    pub component: u8,
    pub operation: u8,
    pub channel: u8,
    pub payload: Vec<u8>,
}
impl From<&Message<'_>> for OwnedMessage {
    fn from(message: &Message<'_>) -> Self {
        Self {
            component: message.component,
            operation: message.operation,
            channel: message.channel,
            payload: message.payload.to_vec(),
        }
    }
}
impl OwnedMessage {
    pub fn as_message(&self) -> Message<'_> {
        Message {
            component: self.component,
            operation: self.operation,
            channel: self.channel,
            payload: &self.payload,
        }
    }
    /// status of this response
    pub fn status(&self) -> Result<Status, Error> {
        Ok(split_status(&self.payload)?.0)
    }
}

/// check the status of a response to `R` and decode its body
pub fn decode_response<'a, R: Request>(response: &Message<'a>) -> Result<R::Response<'a>, Error> {
    let (status, body) = split_status(response.payload)?;
    if status != Status::Ok
        {return Err(Error::Status(status))}
    Ok(<R::Response<'a> as Decode<'a>>::decode(body)?)
}
