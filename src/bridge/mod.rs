/*!
    bridge side components, serving peripherals implementing `embedded-hal` traits

    a bridge registers its components in a [crate::dispatch::Dispatcher] and runs the resulting transport, either with [serve] over an `embedded-io-async` serial port, or by polling with any [crate::driver::BlockDriver]

    ```ignore
    let mut control = BridgeControl::new(BridgeInfo {hardware: "esp32", firmware_version: 1, components: &[Component::Bridge, Component::I2cMaster]}, delay);
    let mut i2c = I2cMaster::new([port]);
    let mut dispatcher = Dispatcher::<2>::new();
    dispatcher
        .register(Component::Bridge, &mut control)?
        .register(Component::I2cMaster, &mut i2c)?;
    let mut transport = Transport::<_, _, 256>::new(Deferred, dispatcher);
    serve(&mut uart, &mut transport).await
    ```
*/

mod control;
mod i2c;
mod spi;
mod serve;

pub use control::*;
pub use i2c::*;
pub use spi::*;
pub use serve::*;
