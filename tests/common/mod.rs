//! simulated bridge hardware shared by the integration tests

#![allow(dead_code)]

use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Mutex, atomic::{AtomicBool, Ordering}},
    thread,
    time::Duration,
    };
use embedded_hal::{
    delay::DelayNs,
    i2c::{self, NoAcknowledgeSource},
    spi,
    };

use multibus::{
    bridge::*,
    dispatch::{Dispatcher, Stats},
    driver::StreamDriver,
    protocol::Component,
    transport::{Transport, TransportError},
    };


/// I2C address answering on the simulated bus
pub const SENSOR: u8 = 0x23;
/// bytes returned by the sensor, in a loop
pub const MEASUREMENT: [u8; 2] = [0x01, 0x02];
pub const HARDWARE: &str = "simulated bridge";
pub const FIRMWARE_VERSION: u8 = 7;
/// frame size of the simulated bridge
pub const BRIDGE_FRAME: usize = 256;
pub const COMPONENTS: &[Component] = &[Component::Bridge, Component::I2cMaster, Component::SpiMaster];


/// one end of an in-memory byte pipe, never blocking
pub struct Endpoint {
    input: Arc<Mutex<VecDeque<u8>>>,
    output: Arc<Mutex<VecDeque<u8>>>,
    /// maximum bytes transferred by one read or write
    chunk: usize,
}
/// two connected endpoints, each transfer moving at most `chunk` bytes
pub fn pipe(chunk: usize) -> (Endpoint, Endpoint) {
    let a = Arc::new(Mutex::new(VecDeque::new()));
    let b = Arc::new(Mutex::new(VecDeque::new()));
    (
        Endpoint {input: a.clone(), output: b.clone(), chunk},
        Endpoint {input: b, output: a, chunk},
    )
}
impl io::Read for Endpoint {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut input = self.input.lock().unwrap();
        if input.is_empty()
            {return Err(io::ErrorKind::WouldBlock.into())}
        let size = buf.len().min(self.chunk).min(input.len());
        for (byte, value) in buf.iter_mut().zip(input.drain(.. size)) {
            *byte = value;
        }
        Ok(size)
    }
}
impl io::Write for Endpoint {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let size = buf.len().min(self.chunk);
        self.output.lock().unwrap().extend(&buf[.. size]);
        Ok(size)
    }
    fn flush(&mut self) -> io::Result<()> {Ok(())}
}


/// I2C bus with one sensor at [SENSOR]
#[derive(Clone, Debug, Default)]
pub struct SimI2c {
    /// frequency and pull-ups of the last configuration
    pub config: Option<(u32, bool, bool)>,
    pub written: Vec<u8>,
}
impl i2c::ErrorType for SimI2c {
    type Error = i2c::ErrorKind;
}
impl i2c::I2c for SimI2c {
    fn transaction(&mut self, address: u8, operations: &mut [i2c::Operation<'_>]) -> Result<(), Self::Error> {
        if address != SENSOR
            {return Err(i2c::ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))}
        for operation in operations {
            match operation {
                i2c::Operation::Write(data) => self.written.extend_from_slice(data),
                i2c::Operation::Read(buffer) => {
                    for (byte, value) in buffer.iter_mut().zip(MEASUREMENT.iter().cycle()) {
                        *byte = *value;
                    }
                },
            }
        }
        Ok(())
    }
}
impl ConfigurableI2c for SimI2c {
    fn configure(&mut self, frequency: u32, sda_pullup: bool, scl_pullup: bool) -> Result<(), Self::Error> {
        self.config = Some((frequency, sda_pullup, scl_pullup));
        Ok(())
    }
}

/// SPI device reading a counting sequence and answering transfers with the complement of what it receives
#[derive(Clone, Debug, Default)]
pub struct SimSpi {
    pub settings: Option<SpiSettings>,
    pub written: Vec<u8>,
}
impl spi::ErrorType for SimSpi {
    type Error = spi::ErrorKind;
}
impl spi::SpiDevice<u8> for SimSpi {
    fn transaction(&mut self, operations: &mut [spi::Operation<'_, u8>]) -> Result<(), Self::Error> {
        for operation in operations {
            match operation {
                spi::Operation::Read(words) => {
                    for (i, word) in words.iter_mut().enumerate() {
                        *word = i as u8;
                    }
                },
                spi::Operation::Write(words) => self.written.extend_from_slice(words),
                spi::Operation::Transfer(read, write) => {
                    self.written.extend_from_slice(write);
                    for (word, sent) in read.iter_mut().zip(write.iter()) {
                        *word = !sent;
                    }
                },
                spi::Operation::TransferInPlace(words) => {
                    self.written.extend_from_slice(words);
                    for word in words.iter_mut() {
                        *word = !*word;
                    }
                },
                spi::Operation::DelayNs(_) => {},
            }
        }
        Ok(())
    }
}
impl ConfigurableSpi for SimSpi {
    fn configure(&mut self, settings: &SpiSettings) -> Result<(), Self::Error> {
        self.settings = Some(*settings);
        Ok(())
    }
}

/// delays returning immediately, unless `real`
pub struct SimDelay {
    pub real: bool,
}
impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        if self.real {
            thread::sleep(Duration::from_nanos(ns.into()));
        }
    }
}


/// state of the simulated bridge once stopped
#[derive(Debug)]
pub struct Report {
    pub stats: Stats,
    /// frames discarded because larger than [BRIDGE_FRAME]
    pub oversized: u32,
    pub i2c: SimI2c,
    pub spi: [SimSpi; 2],
}

/// components of the simulated bridge, with one I2C port and two SPI ports
pub struct Hardware {
    pub control: BridgeControl<'static, SimDelay>,
    pub i2c: I2cMaster<SimI2c>,
    pub spi: SpiMaster<SimSpi, 2>,
}
impl Hardware {
    pub fn new() -> Self {
        Self::with_delay(SimDelay {real: false})
    }
    /// hardware really waiting for delay requests
    pub fn sleeping() -> Self {
        Self::with_delay(SimDelay {real: true})
    }
    fn with_delay(delay: SimDelay) -> Self {
        Self {
            control: BridgeControl::new(BridgeInfo {
                hardware: HARDWARE,
                firmware_version: FIRMWARE_VERSION,
                components: COMPONENTS,
                }, delay),
            i2c: I2cMaster::new([SimI2c::default()]),
            spi: SpiMaster::new([SimSpi::default(), SimSpi::default()]),
        }
    }
    pub fn dispatcher(&mut self) -> Dispatcher<'_, 3> {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .register(Component::Bridge, &mut self.control).unwrap()
            .register(Component::I2cMaster, &mut self.i2c).unwrap()
            .register(Component::SpiMaster, &mut self.spi).unwrap();
        dispatcher
    }
    pub fn report(&self, stats: Stats, oversized: u32) -> Report {
        Report {
            stats,
            oversized,
            i2c: self.i2c.port(0).unwrap().clone(),
            spi: [self.spi.port(0).unwrap().clone(), self.spi.port(1).unwrap().clone()],
        }
    }
}

/// poll a bridge over `stream` until `stop` is raised
fn run_bridge(mut hardware: Hardware, stream: Endpoint, stop: &AtomicBool) -> Report {
    let mut transport = Transport::<_, _, BRIDGE_FRAME>::new(StreamDriver::new(stream), hardware.dispatcher());
    while !stop.load(Ordering::Relaxed) {
        match transport.poll() {
            Ok(true) => {},
            Ok(false) => thread::sleep(Duration::from_micros(100)),
            Err(TransportError::Oversized {..}) => {},
            Err(error) => panic!("bridge failure: {}", error),
        }
    }
    let (stats, oversized) = (transport.handler().stats(), transport.oversized());
    drop(transport);
    hardware.report(stats, oversized)
}

/// raise the stop flag when dropped, so a panicking host does not leave the bridge running
struct StopOnDrop<'a>(&'a AtomicBool);
impl Drop for StopOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/**
    run `host` against a simulated bridge polled in a separate thread

    the pipe between them transfers at most `chunk` bytes at a time
*/
pub fn with_bridge<T>(chunk: usize, host: impl FnOnce(Endpoint) -> T) -> (T, Report) {
    with_hardware(Hardware::new(), chunk, host)
}
/// same as [with_bridge] with the given bridge hardware
pub fn with_hardware<T>(hardware: Hardware, chunk: usize, host: impl FnOnce(Endpoint) -> T) -> (T, Report) {
    let _ = env_logger::builder().is_test(true).try_init();
    let (host_end, bridge_end) = pipe(chunk);
    let stop = AtomicBool::new(false);
    thread::scope(|scope| {
        let bridge = scope.spawn(|| run_bridge(hardware, bridge_end, &stop));
        let result = {
            let _stop = StopOnDrop(&stop);
            host(host_end)
        };
        (result, bridge.join().unwrap())
    })
}
