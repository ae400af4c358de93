//! async bridge and async host client over an in-memory serial line

mod common;

use std::time::Duration;
use futures_concurrency::future::{Race, Join};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use embedded_io_async::ErrorKind;

use multibus::{
    bridge::{serve, ServeError},
    dispatch::Stats,
    driver::Deferred,
    host::*,
    protocol::{
        Component, Encode, CapacityError, Request, Status, PROTOCOL_VERSION,
        bridge::{GetProtocolVersion, Delay},
        i2c::{self, ClockSpeed},
        },
    transport::Transport,
    };
use common::*;


/// tokio stream seen as an embedded serial port
struct Uart(DuplexStream);

impl embedded_io_async::ErrorType for Uart {
    type Error = ErrorKind;
}
impl embedded_io_async::Read for Uart {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.0.read(buf).await.map_err(|_| ErrorKind::Other)
    }
}
impl embedded_io_async::Write for Uart {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.0.write(buf).await.map_err(|_| ErrorKind::Other)
    }
    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.0.flush().await.map_err(|_| ErrorKind::Other)
    }
}

fn config() -> ClientConfig {
    ClientConfig {
        timeout: Duration::from_millis(200),
        dump_messages: true,
        .. Default::default()
    }
}

/// run a test against a bridge served in the same runtime, return the bridge statistics
fn test<T, F>(test: T) -> Stats
where
    T: FnOnce(SerialClient<DuplexStream>) -> F,
    F: Future,
{
    let _ = env_logger::builder().is_test(true).try_init();
    let mut hardware = Hardware::new();
    tokio::runtime::Runtime::new()
    .expect("failed to create runtime")
    .block_on(async {
        let (host, bridge) = tokio::io::duplex(64);
        let mut uart = Uart(bridge);
        let mut transport = Transport::<_, _, BRIDGE_FRAME>::new(Deferred, hardware.dispatcher());
        (
            async {
                tokio::time::timeout(Duration::from_secs(10), test(SerialClient::new(host, config())))
                .await.expect("aborted test because took too long");
            },
            async {
                match serve(&mut uart, &mut transport).await {
                    Ok(never) => match never {},
                    Err(error) => panic!("bridge failed: {}", error),
                }
            },
        ).race().await;
        transport.handler().stats()
    })
}


#[test]
fn requests() {
    let stats = test(|mut client| async move {
        let message = client.call(0, &GetProtocolVersion).await.unwrap();
        assert_eq!(decode_response::<GetProtocolVersion>(&message.as_message()).unwrap().version, PROTOCOL_VERSION);

        let message = client.call(0, &i2c::Read {address: SENSOR.into(), num_bytes: 2}).await.unwrap();
        assert_eq!(message.payload, [0x00, 0x00, 0x23, 0x01, 0x02]);

        let message = client.call(0, &i2c::Read {address: 0x42, num_bytes: 2}).await.unwrap();
        assert!(matches!(
            decode_response::<i2c::Read>(&message.as_message()),
            Err(Error::Status(Status::SlaveNotConnected))));
    });
    assert_eq!(stats.handled, 3);
}

#[test]
fn lux_sequence() {
    test(|mut client| async move {
        client.call(0, &GetProtocolVersion).await.unwrap();
        let message = client.call(0, &i2c::Config::new(ClockSpeed::Khz100, true)).await.unwrap();
        assert_eq!(message.status().unwrap(), Status::Ok);
        client.call(0, &i2c::Write {address: SENSOR.into(), data: &[0x23]}).await.unwrap();
        client.call(0, &Delay {milliseconds: 30}).await.unwrap();
        let message = client.call(0, &i2c::Read {address: SENSOR.into(), num_bytes: 2}).await.unwrap();
        let read = decode_response::<i2c::Read>(&message.as_message()).unwrap();
        let lux = LuxReading::lux(read.data.try_into().unwrap());
        assert!((lux - 215.0).abs() < 0.01);
    });
}

/// request for a component the bridge does not have
struct Unsupported;
impl Encode for Unsupported {
    fn encode(&self, _buffer: &mut [u8]) -> Result<usize, CapacityError> {Ok(0)}
}
impl Request for Unsupported {
    const COMPONENT: Component = Component::Unknown;
    const OPERATION: u8 = 0x00;
    type Response<'a> = ();
}

#[test]
fn timeout_then_recover() {
    let stats = test(|mut client| async move {
        assert!(matches!(client.call(0, &Unsupported).await, Err(Error::Timeout)));
        let message = client.call(0, &GetProtocolVersion).await.unwrap();
        assert_eq!(message.payload, [0x00, PROTOCOL_VERSION]);
    });
    assert_eq!(stats.unknown_component, 1);
    assert_eq!(stats.handled, 1);
}

#[test]
fn late_response_is_ignored() {
    let _ = env_logger::builder().is_test(true).try_init();
    tokio::runtime::Runtime::new()
    .expect("failed to create runtime")
    .block_on(async {
        let (host, mut bridge) = tokio::io::duplex(64);
        let mut client = SerialClient::new(host, config());
        (
            async {
                assert!(matches!(client.call(0, &GetProtocolVersion).await, Err(Error::Timeout)));
                tokio::time::sleep(Duration::from_millis(100)).await;
                let message = client.call(0, &GetProtocolVersion).await.unwrap();
                assert_eq!(message.payload, [0x00, PROTOCOL_VERSION]);
                assert_eq!(client.mailbox().ignored(), 1);
            },
            async {
                let mut request = [0; 5];
                bridge.read_exact(&mut request).await.unwrap();
                assert_eq!(request, [0x00, 0x00, 0x00, 0x00, 0x00]);
                // answered after the client gave up, with a distinguishable version
                tokio::time::sleep(Duration::from_millis(250)).await;
                bridge.write_all(&[0x00, 0x80, 0x00, 0x00, 0x02, 0x00, 0x55]).await.unwrap();
                bridge.read_exact(&mut request).await.unwrap();
                bridge.write_all(&[0x00, 0x80, 0x00, 0x00, 0x02, 0x00, PROTOCOL_VERSION]).await.unwrap();
            },
        ).join().await;
    });
}

#[test]
fn serve_stops_when_closed() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut hardware = Hardware::new();
    tokio::runtime::Runtime::new()
    .expect("failed to create runtime")
    .block_on(async {
        let (host, bridge) = tokio::io::duplex(64);
        let mut uart = Uart(bridge);
        let mut transport = Transport::<_, _, BRIDGE_FRAME>::new(Deferred, hardware.dispatcher());
        let (served, ()) = (
            serve(&mut uart, &mut transport),
            async {
                let mut client = SerialClient::new(host, config());
                client.call(0, &GetProtocolVersion).await.unwrap();
                drop(client);
            },
        ).join().await;
        assert!(matches!(served, Err(ServeError::Closed)));
    });
}
