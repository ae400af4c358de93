/*!
    message framing over a [BlockDriver]

    the [Transport] owns one receive buffer and one send buffer, each driven by its own non-blocking state machine:

    - reception alternates between a header block and a payload block of the length declared by the header, every complete frame is handed to the [MessageHandler] then the next header is armed
    - emission is either idle or busy with exactly one frame, sending while busy is a contract violation and panics

    the same state machines serve every hosting style:

    - tight polling: call [Transport::poll] in a loop
    - readiness event loops: call [Transport::process_read] and [Transport::process_write] when the medium is ready, and stop watching writability once [Transport::is_sending] turns false
    - interrupt or async completion: use the [crate::driver::Deferred] driver, perform transfers on [Transport::armed_receive] and [Transport::armed_send], then report them with [Transport::block_received] and [Transport::block_sent]
*/

use log::*;
use thiserror::Error;

use crate::{
    driver::BlockDriver,
    header::{Header, HEADER_SIZE, MAX_FRAME},
    protocol::{Request, CapacityError},
    utils::Hex,
    };


/// error raised by the transport
#[derive(Error, Debug)]
pub enum TransportError<E> {
    /// the block driver failed, the armed transfer may be incomplete
    #[error("block driver failure: {0:?}")]
    Driver(E),
    /// an inbound frame was larger than the receive buffer, it has been discarded
    #[error("frame declares {declared} bytes of payload, receive capacity is {capacity}")]
    Oversized {declared: usize, capacity: usize},
    /// an outbound frame is larger than the send buffer
    #[error("frame of {size} bytes exceeds send capacity of {capacity}")]
    FrameTooLarge {size: usize, capacity: usize},
}


/// inbound message, borrowing the receive buffer for the duration of the handler call
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Message<'a> {
    pub component: u8,
    pub operation: u8,
    pub channel: u8,
    pub payload: &'a [u8],
}
impl Message<'_> {
    pub fn header(&self) -> Header {
        Header {
            component: self.component,
            operation: self.operation,
            channel: self.channel,
            payload_length: u16::try_from(self.payload.len()).unwrap_or(u16::MAX),
        }
    }
}

/// receiver of inbound messages, called once per complete frame
pub trait MessageHandler<D: BlockDriver, const N: usize> {
    /// process a message, responses can be sent right away through `link`
    fn on_message(&mut self, message: &Message<'_>, link: &mut Link<D, N>);
    /// the frame being sent is complete, `link` is idle and ready for the next one
    fn on_sent(&mut self, _link: &mut Link<D, N>) {}
}


/**
    framing transport over a block driver

    `N` is the size of each of its two buffers, hence the maximum frame size including the header
*/
pub struct Transport<D, H, const N: usize = MAX_FRAME> {
    link: Link<D, N>,
    receiver: Receiver<N>,
    handler: H,
    oversized: u32,
}

/// emission half of a transport, handed to message handlers for answering
pub struct Link<D, const N: usize> {
    driver: D,
    buffer: [u8; N],
    state: TxState,
    dump: bool,
}

struct Receiver<const N: usize> {
    buffer: [u8; N],
    state: RxState,
}

/// reception is armed from construction on, so there is no idle state
#[derive(Copy, Clone, Debug, PartialEq)]
enum RxState {
    AwaitingHeader,
    AwaitingPayload(usize),
    /// skipping the remaining bytes of an oversized frame
    Discarding(usize),
}
#[derive(Copy, Clone, Debug, PartialEq)]
enum TxState {
    Idle,
    /// sending a frame of the given size
    Busy(usize),
}


impl<D: BlockDriver, H: MessageHandler<D, N>, const N: usize> Transport<D, H, N> {
    /// create a transport and immediately arm reception of the first header
    pub fn new(mut driver: D, handler: H) -> Self {
        assert!(N > HEADER_SIZE, "transport buffers must have room for a header and a payload");
        driver.receive_block(HEADER_SIZE);
        Self {
            link: Link {
                driver,
                buffer: [0; N],
                state: TxState::Idle,
                dump: false,
            },
            receiver: Receiver {
                buffer: [0; N],
                state: RxState::AwaitingHeader,
            },
            handler,
            oversized: 0,
        }
    }

    /// hexdump every inbound and outbound frame to the log, at info level
    pub fn enable_logging(&mut self) {
        self.link.dump = true;
    }
    /// the registered message handler
    pub fn handler(&self) -> &H {&self.handler}
    pub fn handler_mut(&mut self) -> &mut H {&mut self.handler}
    /// emission half of the transport
    pub fn link(&mut self) -> &mut Link<D, N> {&mut self.link}
    /// give the handler and the emission half at once, for handlers initiating exchanges
    pub fn with_handler<R>(&mut self, action: impl FnOnce(&mut H, &mut Link<D, N>) -> R) -> R {
        action(&mut self.handler, &mut self.link)
    }
    /// number of inbound frames discarded because larger than the receive buffer
    pub fn oversized(&self) -> u32 {self.oversized}
    /// maximum payload size of inbound and outbound frames
    pub fn capacity(&self) -> usize {N - HEADER_SIZE}

    /// send an encoded frame, header included. See [Link::send]
    pub fn send(&mut self, frame: &[u8]) -> Result<(), TransportError<D::Error>> {
        self.link.send(frame)
    }
    /// a frame is being sent
    pub fn is_sending(&self) -> bool {
        self.link.is_busy()
    }
    /// give up the frame being sent, so a new one can be sent
    pub fn abandon_send(&mut self) {
        if self.link.is_busy() {
            warn!("abandon emission of pending frame");
            self.link.driver.cancel_send();
            self.link.state = TxState::Idle;
        }
    }

    /// the block currently armed for reception
    pub fn armed_receive(&mut self) -> &mut [u8] {
        self.receiver.armed()
    }
    /// the block currently armed for emission, if any
    pub fn armed_send(&self) -> Option<&[u8]> {
        self.link.armed()
    }

    /**
        completion of the armed reception

        this is where messages are delivered to the handler. An oversized frame is reported as an error after arming the discard of its payload, so the transport stays synchronized with the stream
    */
    pub fn block_received(&mut self) -> Result<(), TransportError<D::Error>> {
        match self.receiver.state {
            RxState::AwaitingHeader => {
                let header = Header::read(&self.receiver.buffer);
                trace!("receive header {:?}", header);
                let length = usize::from(header.payload_length);
                if length == 0 {
                    self.deliver(header);
                    self.arm(RxState::AwaitingHeader);
                }
                else if length > self.capacity() {
                    warn!("frame {:?} exceeds receive capacity of {} bytes, discarding it", header, self.capacity());
                    self.oversized = self.oversized.saturating_add(1);
                    self.arm(RxState::Discarding(length));
                    return Err(TransportError::Oversized {declared: length, capacity: self.capacity()});
                }
                else {
                    self.arm(RxState::AwaitingPayload(length));
                }
            },
            RxState::AwaitingPayload(_) => {
                let header = Header::read(&self.receiver.buffer);
                self.deliver(header);
                self.arm(RxState::AwaitingHeader);
            },
            RxState::Discarding(remaining) => {
                let remaining = remaining.saturating_sub(self.capacity());
                if remaining == 0
                    {self.arm(RxState::AwaitingHeader)}
                else
                    {self.arm(RxState::Discarding(remaining))}
            },
        }
        Ok(())
    }
    /// completion of the armed emission
    pub fn block_sent(&mut self) {
        if let TxState::Busy(size) = self.link.state {
            trace!("sent frame of {} bytes", size);
            self.link.state = TxState::Idle;
            self.handler.on_sent(&mut self.link);
        }
    }

    /// make progress on reception, return `true` if a block completed
    pub fn process_read(&mut self) -> Result<bool, TransportError<D::Error>> {
        let block = self.receiver.armed();
        if !self.link.driver.poll_receive(block).map_err(TransportError::Driver)?
            {return Ok(false)}
        self.block_received()?;
        Ok(true)
    }
    /// make progress on emission, return `true` if a frame completed
    pub fn process_write(&mut self) -> Result<bool, TransportError<D::Error>> {
        let TxState::Busy(size) = self.link.state
            else {return Ok(false)};
        if !self.link.driver.poll_send(&self.link.buffer[.. size]).map_err(TransportError::Driver)?
            {return Ok(false)}
        self.block_sent();
        Ok(true)
    }
    /// make all possible progress in both directions, return `true` if any block completed
    pub fn poll(&mut self) -> Result<bool, TransportError<D::Error>> {
        let mut progress = false;
        loop {
            let sent = self.process_write()?;
            let received = self.process_read()?;
            if !(sent || received)
                {break}
            progress = true;
        }
        Ok(progress)
    }

    fn arm(&mut self, state: RxState) {
        self.receiver.state = state;
        let length = self.receiver.armed().len();
        self.link.driver.receive_block(length);
    }
    fn deliver(&mut self, header: Header) {
        let length = usize::from(header.payload_length);
        let frame = &self.receiver.buffer[.. HEADER_SIZE + length];
        if self.link.dump {
            info!("<- {}", Hex(frame));
        }
        let message = Message {
            component: header.component,
            operation: header.operation,
            channel: header.channel,
            payload: &frame[HEADER_SIZE ..],
        };
        self.handler.on_message(&message, &mut self.link);
    }
}

impl<const N: usize> Receiver<N> {
    fn armed(&mut self) -> &mut [u8] {
        match self.state {
            RxState::AwaitingHeader => &mut self.buffer[.. HEADER_SIZE],
            RxState::AwaitingPayload(length) => &mut self.buffer[HEADER_SIZE ..][.. length],
            RxState::Discarding(remaining) => {
                let chunk = remaining.min(N - HEADER_SIZE);
                &mut self.buffer[HEADER_SIZE ..][.. chunk]
            },
        }
    }
}

impl<D: BlockDriver, const N: usize> Link<D, N> {
    /// a frame is being sent
    pub fn is_busy(&self) -> bool {
        matches!(self.state, TxState::Busy(_))
    }
    pub fn driver(&self) -> &D {&self.driver}
    pub fn driver_mut(&mut self) -> &mut D {&mut self.driver}

    /**
        send an encoded frame, header included

        panics if a frame is already being sent, or if `frame` is shorter than a header
    */
    pub fn send(&mut self, frame: &[u8]) -> Result<(), TransportError<D::Error>> {
        self.assert_idle();
        assert!(frame.len() >= HEADER_SIZE, "frame must start with a header");
        if frame.len() > N
            {return Err(TransportError::FrameTooLarge {size: frame.len(), capacity: N})}
        self.buffer[.. frame.len()].copy_from_slice(frame);
        self.start(frame.len());
        Ok(())
    }
    /// frame and send a message
    pub fn send_message(&mut self, component: u8, operation: u8, channel: u8, payload: &[u8]) -> Result<(), TransportError<D::Error>> {
        self.assert_idle();
        if payload.len() > N - HEADER_SIZE
            {return Err(TransportError::FrameTooLarge {size: HEADER_SIZE + payload.len(), capacity: N})}
        self.buffer[HEADER_SIZE ..][.. payload.len()].copy_from_slice(payload);
        self.commit(component, operation, channel, payload.len())
    }
    /// encode and send a request
    pub fn send_request<R: Request>(&mut self, channel: u8, request: &R) -> Result<(), CapacityError> {
        let length = request.encode(self.payload_mut())?;
        self.commit(R::COMPONENT.into(), R::OPERATION, channel, length)
            .map_err(|_| CapacityError)
    }
    /**
        buffer for writing the payload of the next frame in place, to be sent with [Self::commit]

        panics if a frame is being sent
    */
    pub fn payload_mut(&mut self) -> &mut [u8] {
        self.assert_idle();
        &mut self.buffer[HEADER_SIZE ..]
    }
    /// frame and send the first `length` bytes written in [Self::payload_mut]
    pub fn commit(&mut self, component: u8, operation: u8, channel: u8, length: usize) -> Result<(), TransportError<D::Error>> {
        self.assert_idle();
        let too_large = TransportError::FrameTooLarge {size: HEADER_SIZE + length, capacity: N};
        if length > N - HEADER_SIZE
            {return Err(too_large)}
        let payload_length = u16::try_from(length).map_err(|_| too_large)?;
        Header {component, operation, channel, payload_length}.write(&mut self.buffer);
        self.start(HEADER_SIZE + length);
        Ok(())
    }

    fn assert_idle(&self) {
        assert!(!self.is_busy(), "cannot send a frame while the previous one is still being sent");
    }
    fn start(&mut self, size: usize) {
        if self.dump {
            info!("-> {}", Hex(&self.buffer[.. size]));
        }
        self.state = TxState::Busy(size);
        self.driver.send_block(size);
    }
    fn armed(&self) -> Option<&[u8]> {
        match self.state {
            TxState::Idle => None,
            TxState::Busy(size) => Some(&self.buffer[.. size]),
        }
    }
}
