/*!
    block I/O drivers, the only part of the stack touching the actual medium

    a driver transfers whole blocks of known size: it loops on partial reads and writes itself, so the transport above never sees a partial block.

    completion is reported either through [BlockDriver::poll_receive] and [BlockDriver::poll_send] returning `true`, or out of band for [Deferred] where the owner of the medium calls the transport's completion entry points itself
*/

use core::{convert::Infallible, fmt::Debug};


/// transfer of fixed-size blocks over a byte stream
pub trait BlockDriver {
    type Error: Debug;

    /// a block of `length` bytes is armed for reception, any previous reception progress is forgotten
    fn receive_block(&mut self, length: usize);
    /// a block of `length` bytes is armed for emission, any previous emission progress is forgotten
    fn send_block(&mut self, length: usize);
    /// make progress receiving the armed block, return `true` once it is completely filled
    fn poll_receive(&mut self, block: &mut [u8]) -> Result<bool, Self::Error>;
    /// make progress sending the armed block, return `true` once it is completely sent
    fn poll_send(&mut self, block: &[u8]) -> Result<bool, Self::Error>;
    /// the armed emission is abandoned
    fn cancel_send(&mut self) {}
}


/**
    driver for transfers performed outside of the transport

    polling never makes progress. The owner of the medium (an interrupt handler, a DMA completion, an async task) fills [crate::transport::Transport::armed_receive] and sends [crate::transport::Transport::armed_send], then reports completion with `block_received` and `block_sent`
*/
#[derive(Copy, Clone, Debug, Default)]
pub struct Deferred;

impl BlockDriver for Deferred {
    type Error = Infallible;

    fn receive_block(&mut self, _length: usize) {}
    fn send_block(&mut self, _length: usize) {}
    fn poll_receive(&mut self, _block: &mut [u8]) -> Result<bool, Self::Error> {Ok(false)}
    fn poll_send(&mut self, _block: &[u8]) -> Result<bool, Self::Error> {Ok(false)}
}


#[cfg(feature = "std")]
pub use stream::StreamDriver;

#[cfg(feature = "std")]
mod stream {
    use std::io::{self, Read, Write, ErrorKind};
    use log::*;
    use super::BlockDriver;

    /**
        driver over a non-blocking [std::io] stream, like a serial port with a short timeout

        `WouldBlock`, `TimedOut` and `Interrupted` errors are considered as no progress, the transfer is resumed on next poll. An end of stream is an error since the peer is gone
    */
    pub struct StreamDriver<S> {
        stream: S,
        received: usize,
        sent: usize,
    }
    impl<S> StreamDriver<S> {
        pub fn new(stream: S) -> Self {
            Self {stream, received: 0, sent: 0}
        }
        pub fn get_ref(&self) -> &S {&self.stream}
        pub fn get_mut(&mut self) -> &mut S {&mut self.stream}
        pub fn into_inner(self) -> S {self.stream}
    }

    impl<S: Read + Write> BlockDriver for StreamDriver<S> {
        type Error = io::Error;

        fn receive_block(&mut self, _length: usize) {
            self.received = 0;
        }
        fn send_block(&mut self, _length: usize) {
            self.sent = 0;
        }
        fn poll_receive(&mut self, block: &mut [u8]) -> Result<bool, Self::Error> {
            while self.received < block.len() {
                match self.stream.read(&mut block[self.received ..]) {
                    Ok(0) => return Err(ErrorKind::UnexpectedEof.into()),
                    Ok(size) => self.received += size,
                    Err(error) if no_progress(&error) => return Ok(false),
                    Err(error) => return Err(error),
                }
            }
            Ok(true)
        }
        fn poll_send(&mut self, block: &[u8]) -> Result<bool, Self::Error> {
            while self.sent < block.len() {
                match self.stream.write(&block[self.sent ..]) {
                    Ok(0) => return Err(ErrorKind::WriteZero.into()),
                    Ok(size) => self.sent += size,
                    Err(error) if no_progress(&error) => return Ok(false),
                    Err(error) => return Err(error),
                }
            }
            match self.stream.flush() {
                Err(error) if no_progress(&error) => Ok(false),
                result => result.map(|_| true),
            }
        }
        fn cancel_send(&mut self) {
            if self.sent != 0 {
                debug!("abandon emission after {} bytes", self.sent);
            }
            self.sent = 0;
        }
    }

    fn no_progress(error: &io::Error) -> bool {
        matches!(error.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted)
    }
}
