use std::time::Duration;
use multibus::{
    host::{SerialClient, ClientConfig, LuxReading, LUX_SENSOR, open_serial, decode_response},
    protocol::{
        bridge::{GetProtocolVersion, GetHardwareInfo, Delay},
        i2c::{self, ClockSpeed},
        },
    };

/// read a BH1750 light sensor wired on the I2C port 0 of a bridge
#[tokio::main]
async fn main() {
    env_logger::init();
    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| String::from("/dev/ttyUSB0"));
    let rate = args.next().map(|rate| rate.parse().expect("baud rate must be an integer")).unwrap_or(115_200);

    let port = open_serial(&path, rate).unwrap();
    let mut client = SerialClient::new(port, ClientConfig::default());

    let message = client.call(0, &GetProtocolVersion).await.unwrap();
    println!("protocol version {}", decode_response::<GetProtocolVersion>(&message.as_message()).unwrap().version);
    let message = client.call(0, &GetHardwareInfo).await.unwrap();
    println!("hardware: {}", decode_response::<GetHardwareInfo>(&message.as_message()).unwrap().description);

    let message = client.call(0, &i2c::Config::new(ClockSpeed::Khz100, true)).await.unwrap();
    decode_response::<i2c::Config>(&message.as_message()).unwrap();
    for _ in 0 .. 10 {
        // one time measurement in high resolution
        let message = client.call(0, &i2c::Write {address: LUX_SENSOR, data: &[0x23]}).await.unwrap();
        decode_response::<i2c::Write>(&message.as_message()).unwrap();
        client.call(0, &Delay {milliseconds: 180}).await.unwrap();

        let message = client.call(0, &i2c::Read {address: LUX_SENSOR, num_bytes: 2}).await.unwrap();
        let read = decode_response::<i2c::Read>(&message.as_message()).unwrap();
        match <[u8; 2]>::try_from(read.data) {
            Ok(raw) => println!("{:.1} lux", LuxReading::lux(raw)),
            Err(_) => println!("unexpected measurement {:?}", read.data),
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}
