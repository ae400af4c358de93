use std::{path::Path, time::Duration};
use serial2_tokio::{SerialPort, CharSize, StopBits, Parity};
use tokio::io::{AsyncRead, AsyncWrite, AsyncReadExt, AsyncWriteExt};
use log::*;

use crate::{
    driver::Deferred,
    header::MAX_FRAME,
    protocol::{Request, response},
    transport::Transport,
    };
use super::{Error, ClientConfig, OwnedMessage, Mailbox};


/// open a serial port to a bridge, in raw mode 8N1 at the given baud rate
pub fn open_serial(path: impl AsRef<Path>, rate: u32) -> Result<SerialPort, std::io::Error> {
    SerialPort::open(path, |mut settings: serial2_tokio::Settings| {
        settings.set_raw();
        settings.set_baud_rate(rate)?;
        settings.set_char_size(CharSize::Bits8);
        settings.set_stop_bits(StopBits::One);
        settings.set_parity(Parity::None);
        Ok(settings)
        })
}


/**
    async host client over a tokio byte stream

    each call writes its request with cancel safe writes, then reads blocks until the response arrives. The whole exchange is bounded by the configured timeout. A timed out call leaves the stream position untouched: the next call first completes the frame it was writing and drops the input already available, so a late response is not taken for its own. Use [super::decode_response] to check and decode responses
*/
pub struct SerialClient<S, const N: usize = MAX_FRAME> {
    stream: S,
    transport: Transport<Deferred, Mailbox, N>,
    config: ClientConfig,
    /// bytes of the armed reception already received
    received: usize,
    /// bytes of the armed emission already written
    sent: usize,
}

impl<S: AsyncRead + AsyncWrite + Unpin> SerialClient<S> {
    /// client with buffers of [MAX_FRAME] bytes
    pub fn new(stream: S, config: ClientConfig) -> Self {
        Self::from_stream(stream, config)
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin, const N: usize> SerialClient<S, N> {
    pub fn from_stream(stream: S, config: ClientConfig) -> Self {
        let mut transport = Transport::new(Deferred, Mailbox::new());
        if config.dump_messages {
            transport.enable_logging();
        }
        Self {stream, transport, config, received: 0, sent: 0}
    }
    pub fn config(&self) -> &ClientConfig {&self.config}
    pub fn mailbox(&self) -> &Mailbox {self.transport.handler()}
    pub fn into_inner(self) -> S {self.stream}

    /// send a request and wait for its response
    pub async fn call<R: Request>(&mut self, channel: u8, request: &R) -> Result<OwnedMessage, Error> {
        match tokio::time::timeout(self.config.timeout, self.exchange(channel, request)).await {
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
    async fn exchange<R: Request>(&mut self, channel: u8, request: &R) -> Result<OwnedMessage, Error> {
        self.flush_frame().await?;
        self.drain().await?;
        self.transport.handler_mut().expect(R::COMPONENT.into(), response(R::OPERATION));
        self.transport.link().send_request(channel, request)?;
        self.flush_frame().await?;
        loop {
            if let Some(response) = self.transport.handler_mut().take()
                {return Ok(response)}
            self.receive().await?;
        }
    }
    /// write the rest of the armed frame, if any
    async fn flush_frame(&mut self) -> Result<(), Error> {
        while let Some(frame) = self.transport.armed_send() {
            let size = self.stream.write(&frame[self.sent ..]).await?;
            if size == 0
                {return Err(std::io::Error::from(std::io::ErrorKind::WriteZero).into())}
            self.sent += size;
            let complete = self.sent == frame.len();
            if complete {
                self.sent = 0;
                self.transport.block_sent();
                self.stream.flush().await?;
            }
        }
        Ok(())
    }
    /// complete the armed reception, progress is kept across cancellations
    async fn receive(&mut self) -> Result<(), Error> {
        let block = self.transport.armed_receive();
        while self.received < block.len() {
            let size = self.stream.read(&mut block[self.received ..]).await?;
            if size == 0
                {return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into())}
            self.received += size;
        }
        self.received = 0;
        if let Err(error) = self.transport.block_received() {
            debug!("{}", error);
        }
        Ok(())
    }
    /// consume the input already available, with no response expected
    async fn drain(&mut self) -> Result<(), Error> {
        self.transport.handler_mut().reset();
        while let Ok(received) = tokio::time::timeout(Duration::ZERO, self.receive()).await {
            received?;
        }
        Ok(())
    }
}
