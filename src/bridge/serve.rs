use core::convert::Infallible;
use embedded_io_async::{Read, Write, ReadExactError};
use log::*;
use thiserror::Error;

use crate::{
    driver::Deferred,
    transport::{Transport, MessageHandler},
    };


/// error stopping [serve]
#[derive(Error, Debug)]
pub enum ServeError<E> {
    #[error("problem with serial bus: {0:?}")]
    Bus(E),
    #[error("serial bus reached end of stream")]
    Closed,
}

/**
    run a bridge transport over an async serial bus

    blocks are read with `read_exact` and frames written with `write_all`, completions being reported to the transport as they finish. Oversized frames are skipped without stopping, only bus failures end this loop
*/
pub async fn serve<B, H, const N: usize>(bus: &mut B, transport: &mut Transport<Deferred, H, N>) -> Result<Infallible, ServeError<B::Error>>
where
    B: Read + Write,
    H: MessageHandler<Deferred, N>,
{
    loop {
        // a response is sent before reading any further request
        if let Some(frame) = transport.armed_send() {
            bus.write_all(frame).await.map_err(ServeError::Bus)?;
            bus.flush().await.map_err(ServeError::Bus)?;
            transport.block_sent();
        }
        let block = transport.armed_receive();
        no_eof(bus.read_exact(block).await)?;
        if let Err(error) = transport.block_received() {
            debug!("{}", error);
        }
    }
}

/// an end of file means the other end is gone
fn no_eof<T, E>(result: Result<T, ReadExactError<E>>) -> Result<T, ServeError<E>> {
    result.map_err(|e| match e {
        ReadExactError::UnexpectedEof => ServeError::Closed,
        ReadExactError::Other(io) => ServeError::Bus(io),
        })
}
