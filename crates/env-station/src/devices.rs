use color_eyre::eyre::{eyre, Context};
use color_eyre::{Report, Result};
use hal::spidev::{SpiModeFlags, SpidevOptions};
use hal::{Delay, I2cdev, SpidevDevice};
use linux_embedded_hal as hal;
use sensors::bme280::{self, Bme280};
use sensors::max6675::{self, Max6675};
use sensors::ms5611::{self, Ms5611};
use sensors::{DeviceEntry, SensorKind, SharedBus};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

pub type I2cBus = SharedBus<I2cdev>;

pub enum Sensor {
    Bme280(Bme280<I2cBus, Delay>),
    Ms5611(Ms5611<I2cBus, Delay>),
}

impl Sensor {
    pub fn open(entry: &DeviceEntry, bus: &I2cBus) -> Result<Self> {
        let DeviceEntry { name, address } = entry;
        let kind = entry
            .kind()
            .ok_or_else(|| eyre!("Unknown sensor kind for `{name}`"))?;

        let sensor = match kind {
            SensorKind::Bme280 => Bme280::new(bus.clone(), *address, Delay).map(Self::Bme280),
            SensorKind::Ms5611 => Ms5611::new(bus.clone(), *address, Delay).map(Self::Ms5611),
        };
        let sensor = sensor
            .map_err(Report::new)
            .wrap_err_with(|| format!("Could not set up `{name}` at {address:#04x}"))?;
        info!("opened {kind:?} sensor `{name}` at {address:#04x}");
        Ok(sensor)
    }

    pub fn read(&mut self) -> Result<Values> {
        Ok(match self {
            Sensor::Bme280(driver) => Values::Bme280(driver.read_all()?),
            Sensor::Ms5611(driver) => Values::Ms5611(driver.read_all()?),
        })
    }

    /// Puts the sensor in its lowest power state, as far as it has one.
    pub fn park(self) -> Result<()> {
        match self {
            Sensor::Bme280(mut driver) => {
                driver.set_control_mode(bme280::Mode::Sleep.code())?;
            }
            Sensor::Ms5611(_) => (),
        }
        Ok(())
    }
}

pub fn open_thermocouple(path: &Path) -> Result<Max6675<SpidevDevice>> {
    let mut spi = SpidevDevice::open(path)
        .wrap_err_with(|| format!("Could not open spi device {}", path.display()))?;
    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(500_000)
        .mode(SpiModeFlags::SPI_MODE_0)
        .build();
    spi.0
        .configure(&options)
        .wrap_err("Could not configure spi device")?;
    debug!("opened thermocouple on {}", path.display());
    Ok(Max6675::new(spi))
}

/// What gets written out, one json object per sensor per poll.
#[derive(Debug, Clone, Serialize)]
pub struct Reading {
    pub sensor: String,
    #[serde(flatten)]
    pub values: Values,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(untagged)]
pub enum Values {
    Bme280(bme280::Measurements),
    Ms5611(ms5611::Measurements),
    /// An unplugged probe reads as -4096
    Thermocouple { temperature: f64 },
}

impl Values {
    pub fn thermocouple(reading: max6675::Reading) -> Self {
        Self::Thermocouple {
            temperature: reading.or_sentinel(),
        }
    }
}

/// The bme280 hangs outside, the ms5611 inside. Their pressure difference
/// says how much higher the inside one is.
pub fn height_difference(readings: &[Reading]) -> Option<f64> {
    let outside = readings.iter().find_map(|r| match r.values {
        Values::Bme280(m) => Some(m.pressure),
        _ => None,
    })?;
    let inside = readings.iter().find_map(|r| match r.values {
        Values::Ms5611(m) => Some(m.pressure),
        _ => None,
    })?;
    Some(sensors::altitude::height_difference(inside, outside))
}
