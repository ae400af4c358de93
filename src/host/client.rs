use std::time::Instant;
use log::*;

use crate::{
    driver::BlockDriver,
    header::MAX_FRAME,
    protocol::{Request, response},
    transport::{Transport, TransportError, Message, Link, MessageHandler},
    };
use super::{Error, ClientConfig, OwnedMessage};


/**
    transport handler keeping the response to the pending request

    messages arriving while no request is pending, or not matching the pending request's component and response operation, are ignored
*/
#[derive(Debug, Default)]
pub struct Mailbox {
    /// component and operation of the response waited for
    expected: Option<(u8, u8)>,
    response: Option<OwnedMessage>,
    ignored: u32,
}
impl Mailbox {
    pub fn new() -> Self {Self::default()}
    /// wait for a response with the given component and operation, forgetting any previous response
    pub fn expect(&mut self, component: u8, operation: u8) {
        self.expected = Some((component, operation));
        self.response = None;
    }
    /// a response is waited for
    pub fn is_pending(&self) -> bool {self.expected.is_some()}
    /// the received response, if any
    pub fn take(&mut self) -> Option<OwnedMessage> {self.response.take()}
    /// stop waiting, a late response will be ignored
    pub fn reset(&mut self) {
        self.expected = None;
        self.response = None;
    }
    /// number of messages ignored so far
    pub fn ignored(&self) -> u32 {self.ignored}

    fn receive(&mut self, message: &Message<'_>) {
        match self.expected {
            Some((component, operation)) if message.component == component && message.operation == operation => {
                self.response = Some(OwnedMessage::from(message));
                self.expected = None;
            },
            Some(_) => {
                warn!("response {:?} does not match pending request, ignored", message.header());
                self.ignored = self.ignored.saturating_add(1);
            },
            None => {
                warn!("unexpected message {:?}, ignored", message.header());
                self.ignored = self.ignored.saturating_add(1);
            },
        }
    }
}
impl<D: BlockDriver, const N: usize> MessageHandler<D, N> for Mailbox {
    fn on_message(&mut self, message: &Message<'_>, _link: &mut Link<D, N>) {
        self.receive(message)
    }
}


/**
    host client over a polled block driver

    every call sends one request and polls the transport until its response arrives or the configured timeout expires. After a timeout the client is ready for a new request: a frame left partially sent is completed and any late response is ignored before the next request goes out
*/
pub struct Client<D, const N: usize = MAX_FRAME> {
    transport: Transport<D, Mailbox, N>,
    config: ClientConfig,
}

impl<D> Client<D>
where
    D: BlockDriver,
    D::Error: Into<Error>,
{
    /// client with buffers of [MAX_FRAME] bytes
    pub fn new(driver: D, config: ClientConfig) -> Self {
        Self::from_driver(driver, config)
    }
}

impl<D, const N: usize> Client<D, N>
where
    D: BlockDriver,
    D::Error: Into<Error>,
{
    pub fn from_driver(driver: D, config: ClientConfig) -> Self {
        let mut transport = Transport::new(driver, Mailbox::new());
        if config.dump_messages {
            transport.enable_logging();
        }
        Self {transport, config}
    }
    pub fn config(&self) -> &ClientConfig {&self.config}
    pub fn config_mut(&mut self) -> &mut ClientConfig {&mut self.config}
    pub fn transport(&mut self) -> &mut Transport<D, Mailbox, N> {&mut self.transport}

    /// send a request and block until its response arrives
    pub fn call<R: Request>(&mut self, channel: u8, request: &R) -> Result<OwnedMessage, Error> {
        let deadline = Instant::now() + self.config.timeout;
        self.settle(deadline)?;
        self.begin(channel, request)?;
        self.wait(deadline)
    }
    /// send a raw message and block until a response with the same component and the response operation arrives
    pub fn call_raw(&mut self, component: u8, operation: u8, channel: u8, payload: &[u8]) -> Result<OwnedMessage, Error> {
        let deadline = Instant::now() + self.config.timeout;
        self.settle(deadline)?;
        self.transport.handler_mut().expect(component, response(operation));
        if let Err(error) = self.transport.link().send_message(component, operation, channel, payload) {
            self.transport.handler_mut().reset();
            return Err(self.fault(error));
        }
        self.wait(deadline)
    }
    /// send a request and wait for its response, leaving the runtime to other tasks when nothing progresses
    pub async fn call_async<R: Request>(&mut self, channel: u8, request: &R) -> Result<OwnedMessage, Error> {
        match tokio::time::timeout(self.config.timeout, self.exchange_async(channel, request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(error)) => {
                self.transport.handler_mut().reset();
                Err(error)
            },
            Err(_) => {
                warn!("no response after {:?}", self.config.timeout);
                self.transport.handler_mut().reset();
                Err(Error::Timeout)
            },
        }
    }

    /**
        finish sending the frame a previous call may have left, and drop the messages already received

        nothing is expected by the mailbox meanwhile, so a late response to a timed out request is counted as ignored instead of being taken for the next response
    */
    fn settle(&mut self, deadline: Instant) -> Result<(), Error> {
        self.transport.handler_mut().reset();
        loop {
            let progress = self.step()?;
            if !progress && !self.transport.is_sending()
                {return Ok(())}
            if Instant::now() >= deadline {
                warn!("previous frame still being sent after {:?}", self.config.timeout);
                return Err(Error::Timeout);
            }
            if !progress {
                self.pause();
            }
        }
    }
    async fn settle_async(&mut self) -> Result<(), Error> {
        self.transport.handler_mut().reset();
        loop {
            let progress = self.step()?;
            if !progress && !self.transport.is_sending()
                {return Ok(())}
            if !progress {
                self.pause_async().await;
            }
        }
    }
    fn begin<R: Request>(&mut self, channel: u8, request: &R) -> Result<(), Error> {
        self.transport.handler_mut().expect(R::COMPONENT.into(), response(R::OPERATION));
        if let Err(error) = self.transport.link().send_request(channel, request) {
            self.transport.handler_mut().reset();
            return Err(error.into());
        }
        Ok(())
    }
    fn wait(&mut self, deadline: Instant) -> Result<OwnedMessage, Error> {
        loop {
            let progress = match self.step() {
                Ok(progress) => progress,
                Err(error) => {
                    self.transport.handler_mut().reset();
                    return Err(error);
                },
            };
            if let Some(response) = self.transport.handler_mut().take()
                {return Ok(response)}
            if Instant::now() >= deadline {
                warn!("no response after {:?}", self.config.timeout);
                self.transport.handler_mut().reset();
                return Err(Error::Timeout);
            }
            if !progress {
                self.pause();
            }
        }
    }
    async fn exchange_async<R: Request>(&mut self, channel: u8, request: &R) -> Result<OwnedMessage, Error> {
        self.settle_async().await?;
        self.begin(channel, request)?;
        loop {
            let progress = self.step()?;
            if let Some(response) = self.transport.handler_mut().take()
                {return Ok(response)}
            if !progress {
                self.pause_async().await;
            }
        }
    }
    fn pause(&self) {
        if let Some(interval) = self.config.poll_interval {
            std::thread::sleep(interval);
        }
    }
    async fn pause_async(&self) {
        match self.config.poll_interval {
            Some(interval) => tokio::time::sleep(interval).await,
            None => tokio::task::yield_now().await,
        }
    }
    /// poll the transport, oversized frames are skipped
    fn step(&mut self) -> Result<bool, Error> {
        match self.transport.poll() {
            Ok(progress) => Ok(progress),
            Err(TransportError::Oversized {..}) => Ok(true),
            Err(error) => Err(self.fault(error)),
        }
    }
    fn fault(&self, error: TransportError<D::Error>) -> Error {
        match error {
            TransportError::Driver(error) => error.into(),
            TransportError::Oversized {..} => Error::Host("response larger than receive buffer"),
            TransportError::FrameTooLarge {..} => Error::Capacity,
        }
    }
}
