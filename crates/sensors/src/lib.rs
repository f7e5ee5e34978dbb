//! Drivers for the sensors of the environment station: a bme280
//! (temperature, pressure and humidity), an ms5611 (barometric pressure and
//! temperature) and a max6675 thermocouple amplifier.
//!
//! The drivers only need a [`bus::Bus`] (any embedded-hal 1.0 i2c bus or a
//! [`bus::SharedBus`] around one) or a [`bus::ClockedBus`] (any embedded-hal
//! spi device) and a blocking delay. Everything from raw register bytes to
//! physical units happens in here.

pub mod altitude;
pub mod bme280;
pub mod bus;
pub mod decode;
pub mod max6675;
pub mod ms5611;
pub mod registry;
pub mod relay;

mod error;

pub use bus::{Bus, ClockedBus, RegisterBus, SharedBus};
pub use error::Error;
pub use registry::{DeviceEntry, Registry, SensorKind};
pub use relay::{DigitalOutput, PinId, RelayTable};
