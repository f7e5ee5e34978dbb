//! TE ms5611 barometric pressure sensor over i2c.
//!
//! Every read starts two conversions, one for the raw pressure (D1) and one
//! for the raw temperature (D2), and combines them with six factory
//! constants from the sensor's PROM.

use embedded_hal::delay::DelayNs;
use serde::Serialize;
use tracing::{debug, instrument, trace};

use crate::bus::{Bus, RegisterBus};
use crate::decode::{unsigned16_be, unsigned24_be};
use crate::Error;

/// Address with CSB tied to ground
pub const DEFAULT_ADDRESS: u8 = 0x77;
/// Address with CSB tied to vcc
pub const SECONDARY_ADDRESS: u8 = 0x76;

const CMD_RESET: u8 = 0x1E;
const CMD_CONVERT_D1: u8 = 0x40;
const CMD_CONVERT_D2: u8 = 0x50;
const CMD_ADC_READ: u8 = 0x00;
const PROM_CELLS: [u8; 6] = [0xA2, 0xA4, 0xA6, 0xA8, 0xAA, 0xAC];
const RESET_RELOAD_US: u32 = 2_800;

/// Returned in the order pressure, temperature. Note the
/// [`bme280`](crate::bme280::Measurements) puts temperature first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Measurements {
    /// hPa
    pub pressure: f64,
    /// degrees celsius
    pub temperature: f64,
}

impl From<Measurements> for (f64, f64) {
    fn from(m: Measurements) -> Self {
        (m.pressure, m.temperature)
    }
}

/// Oversampling ratio of the adc, higher is slower and less noisy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Oversampling {
    #[default]
    Osr256,
    Osr512,
    Osr1024,
    Osr2048,
    Osr4096,
}

impl Oversampling {
    fn command_offset(self) -> u8 {
        match self {
            Self::Osr256 => 0x0,
            Self::Osr512 => 0x2,
            Self::Osr1024 => 0x4,
            Self::Osr2048 => 0x6,
            Self::Osr4096 => 0x8,
        }
    }

    /// Upper bound on conversion time. Osr256 keeps the 2.1ms wait the
    /// station has always used, the others are the datasheet maxima.
    pub fn conversion_us(self) -> u32 {
        match self {
            Self::Osr256 => 2_100,
            Self::Osr512 => 1_170,
            Self::Osr1024 => 2_280,
            Self::Osr2048 => 4_540,
            Self::Osr4096 => 9_040,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Calibration {
    /// pressure sensitivity, SENS_T1
    pub c1: u16,
    /// pressure offset, OFF_T1
    pub c2: u16,
    /// temperature coefficient of pressure sensitivity, TCS
    pub c3: u16,
    /// temperature coefficient of pressure offset, TCO
    pub c4: u16,
    /// reference temperature, T_REF
    pub c5: u16,
    /// temperature coefficient of the temperature, TEMPSENS
    pub c6: u16,
}

/// Corrections applied below 20°C, all zero above.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SecondOrder {
    pub t2: f64,
    pub off2: f64,
    pub sens2: f64,
}

/// `temp` in centi degrees celsius as computed by the first order formula,
/// `dt` the difference between actual and reference temperature.
pub fn second_order(temp: f64, dt: f64) -> SecondOrder {
    if temp >= 2000.0 {
        return SecondOrder::default();
    }

    let low = (temp - 2000.0) * (temp - 2000.0);
    let mut correction = SecondOrder {
        t2: (dt * dt) / 2147483648.0,
        off2: 5.0 * low / 2.0,
        sens2: 5.0 * low / 4.0,
    };

    if temp < -1500.0 {
        let very_low = (temp + 1500.0) * (temp + 1500.0);
        correction.off2 += 7.0 * very_low;
        correction.sens2 += 11.0 * very_low / 2.0;
    }
    correction
}

impl Calibration {
    /// `d1` raw pressure, `d2` raw temperature.
    pub fn compensate(&self, d1: u32, d2: u32) -> Measurements {
        let dt = (i64::from(d2) - i64::from(self.c5) * 256) as f64;
        let mut temp = 2000.0 + dt * f64::from(self.c6) / 8388608.0;
        let mut off = f64::from(self.c2) * 65536.0 + f64::from(self.c4) * dt / 128.0;
        let mut sens = f64::from(self.c1) * 32768.0 + f64::from(self.c3) * dt / 256.0;

        let SecondOrder { t2, off2, sens2 } = second_order(temp, dt);
        temp -= t2;
        off -= off2;
        sens -= sens2;

        let pressure = ((f64::from(d1) * sens / 2097152.0 - off) / 32768.0) / 100.0;
        Measurements {
            pressure,
            temperature: temp / 100.0,
        }
    }
}

pub struct Ms5611<B, D> {
    bus: B,
    delay: D,
    address: u8,
    calibration: Calibration,
    oversampling: Oversampling,
}

impl<B: Bus, D: DelayNs> Ms5611<B, D> {
    /// Reads the PROM. If the first cell can not be read there is no sensor
    /// at `address` and [`Error::NotPresent`] is returned.
    #[instrument(skip(bus, delay), err(Debug))]
    pub fn new(mut bus: B, address: u8, delay: D) -> Result<Self, Error<B::Error>> {
        let mut words = [0u16; 6];
        {
            let mut bus = bus.acquire();
            for (i, (word, cell)) in words.iter_mut().zip(PROM_CELLS).enumerate() {
                let data = bus.read_array::<2>(address, cell).map_err(|cause| {
                    if i == 0 {
                        Error::NotPresent { address, cause }
                    } else {
                        Error::Transport(cause)
                    }
                })?;
                *word = unsigned16_be(&data, 0);
            }
        }

        let [c1, c2, c3, c4, c5, c6] = words;
        let calibration = Calibration {
            c1,
            c2,
            c3,
            c4,
            c5,
            c6,
        };
        debug!("calibration: {calibration:?}");

        Ok(Self {
            bus,
            delay,
            address,
            calibration,
            oversampling: Oversampling::default(),
        })
    }

    pub fn with_oversampling(mut self, oversampling: Oversampling) -> Self {
        self.oversampling = oversampling;
        self
    }

    /// Reloads the PROM into the sensor's internal registers. The
    /// calibration held by the driver does not change.
    pub fn reset(&mut self) -> Result<(), Error<B::Error>> {
        let mut bus = self.bus.acquire();
        bus.write_command(self.address, CMD_RESET)
            .map_err(Error::Transport)?;
        self.delay.delay_us(RESET_RELOAD_US);
        Ok(())
    }

    /// Raw pressure (D1) and temperature (D2). Both conversions happen while
    /// holding the bus.
    pub fn read_raw(&mut self) -> Result<(u32, u32), Error<B::Error>> {
        let offset = self.oversampling.command_offset();
        let wait = self.oversampling.conversion_us();

        let mut bus = self.bus.acquire();
        let mut convert = |command: u8| -> Result<u32, Error<B::Error>> {
            bus.write_command(self.address, command)
                .map_err(Error::Transport)?;
            self.delay.delay_us(wait);
            let data = bus
                .read_array::<3>(self.address, CMD_ADC_READ)
                .map_err(Error::Transport)?;
            Ok(unsigned24_be(&data, 0))
        };

        let d1 = convert(CMD_CONVERT_D1 + offset)?;
        let d2 = convert(CMD_CONVERT_D2 + offset)?;
        trace!("raw pressure: {d1}, raw temperature: {d2}");
        Ok((d1, d2))
    }

    pub fn read_all(&mut self) -> Result<Measurements, Error<B::Error>> {
        let (d1, d2) = self.read_raw()?;
        Ok(self.calibration.compensate(d1, d2))
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn oversampling(&self) -> Oversampling {
        self.oversampling
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn release(self) -> (B, D) {
        (self.bus, self.delay)
    }
}
