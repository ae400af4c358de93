/*!
    MultiBus: drive the peripheral buses (I2C, SPI, delays) of a microcontroller bridge from a host, over a serial byte stream.

    Both ends share the same core:

    - [driver] moves fixed-size blocks of bytes, whatever the actual medium
    - [transport] frames those blocks into header + payload messages, with a non-blocking state machine on each direction
    - [dispatch] routes inbound requests to the bridge's components and emits exactly one response per handled request
    - [protocol] defines identifiers, status codes and payload layouts of every known operation

    the `host` feature adds the request/response correlation helpers, the `bridge` feature adds the peripheral components based on `embedded-hal`
*/
#![no_std]
#[cfg(any(feature = "std", test))]
extern crate std;

mod utils;

pub mod header;
pub mod protocol;
pub mod driver;
pub mod transport;
pub mod dispatch;
#[cfg(feature = "host")]
pub mod host;
#[cfg(feature = "bridge")]
pub mod bridge;

pub use utils::Hex;
