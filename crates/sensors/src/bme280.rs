//! Bosch bme280, temperature pressure and humidity over i2c.
//!
//! The sensor sends raw adc words, [`Calibration`] turns those into
//! physical units using trim values read once from the sensor when the
//! driver is created.

use std::time::Duration;

use embedded_hal::delay::DelayNs;
use serde::Serialize;
use tracing::{debug, instrument, trace};

use crate::bus::{Bus, RegisterBus};
use crate::Error;

mod calibration;
pub use calibration::{temperature, Calibration, RawSample};

/// Address with SDO tied to ground
pub const DEFAULT_ADDRESS: u8 = 0x76;
/// Address with SDO tied to vcc
pub const SECONDARY_ADDRESS: u8 = 0x77;
pub const CHIP_ID: u8 = 0x60;

const REG_ID: u8 = 0xD0;
const REG_CTRL_HUM: u8 = 0xF2;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_DATA: u8 = 0xF7;
const REG_CALIB_00: u8 = 0x88;
const REG_CALIB_25: u8 = 0xA1;
const REG_CALIB_26: u8 = 0xE1;

const OSRS_MASK: u8 = 0b111;
const OSRS_P_SHIFT: u8 = 2;
const OSRS_T_SHIFT: u8 = 5;
const MODE_MASK: u8 = 0b11;

/// Returned in the order temperature, pressure, humidity. Note the
/// [`ms5611`](crate::ms5611::Measurements) puts pressure first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Measurements {
    /// degrees celsius
    pub temperature: f64,
    /// hPa
    pub pressure: f64,
    /// percent relative humidity, always within 0..=100
    pub humidity: f64,
}

/// The discriminant is the value of the 3 bit register field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Oversampling {
    X1 = 1,
    X2 = 2,
    X4 = 3,
    X8 = 4,
    X16 = 5,
}

impl Oversampling {
    pub fn from_factor(factor: u8) -> Option<Self> {
        Some(match factor {
            1 => Self::X1,
            2 => Self::X2,
            4 => Self::X4,
            8 => Self::X8,
            16 => Self::X16,
            _ => return None,
        })
    }

    pub fn factor(self) -> u8 {
        1 << (self as u8 - 1)
    }

    fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mode {
    /// No measurements, lowest power
    Sleep = 0b00,
    /// Measure once then go back to sleep
    Forced = 0b01,
    /// Measure continuously
    Normal = 0b11,
}

impl Mode {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0b00 => Self::Sleep,
            0b01 => Self::Forced,
            0b11 => Self::Normal,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Config {
    pub temperature: Oversampling,
    pub pressure: Oversampling,
    pub humidity: Oversampling,
    pub mode: Mode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            temperature: Oversampling::X2,
            pressure: Oversampling::X2,
            humidity: Oversampling::X2,
            mode: Mode::Forced,
        }
    }
}

/// Maximum measurement time from datasheet appendix B:
/// `1.25 + 2.3*osT + (2.3*osP + 0.575) + (2.3*osH + 0.575)` ms. Computed in
/// microseconds so it stays exact.
pub fn settling_delay_us(config: &Config) -> u32 {
    let t = u32::from(config.temperature.factor());
    let p = u32::from(config.pressure.factor());
    let h = u32::from(config.humidity.factor());
    1250 + 2300 * t + (2300 * p + 575) + (2300 * h + 575)
}

pub struct Bme280<B, D> {
    bus: B,
    delay: D,
    address: u8,
    calibration: Calibration,
    config: Config,
    settling_us: u32,
}

impl<B: Bus, D: DelayNs> Bme280<B, D> {
    /// Reads the calibration and configures the sensor for 2x oversampling
    /// on every channel in forced mode.
    pub fn new(bus: B, address: u8, delay: D) -> Result<Self, Error<B::Error>> {
        Self::with_config(bus, address, delay, Config::default())
    }

    #[instrument(skip(bus, delay), err(Debug))]
    pub fn with_config(
        mut bus: B,
        address: u8,
        delay: D,
        config: Config,
    ) -> Result<Self, Error<B::Error>> {
        let calibration = {
            let mut bus = bus.acquire();
            let cal1 = bus.read_array::<24>(address, REG_CALIB_00);
            let cal1 = cal1.map_err(Error::Transport)?;
            let cal2 = bus.read_array::<1>(address, REG_CALIB_25);
            let cal2 = cal2.map_err(Error::Transport)?;
            let cal3 = bus.read_array::<7>(address, REG_CALIB_26);
            let cal3 = cal3.map_err(Error::Transport)?;
            Calibration::from_blocks(&cal1, &cal2, &cal3)
        };
        debug!("calibration: {calibration:?}");

        let mut sensor = Self {
            bus,
            delay,
            address,
            calibration,
            config,
            settling_us: settling_delay_us(&config),
        };
        sensor.apply_humidity(config.humidity)?;
        sensor.apply_pressure(config.pressure)?;
        sensor.apply_temperature(config.temperature)?;
        sensor.apply_mode(config.mode)?;
        Ok(sensor)
    }

    /// Chip id (0x60 for a bme280) and version.
    pub fn read_id(&mut self) -> Result<(u8, u8), Error<B::Error>> {
        let mut bus = self.bus.acquire();
        let [id, version] = bus
            .read_array::<2>(self.address, REG_ID)
            .map_err(Error::Transport)?;
        Ok((id, version))
    }

    /// `factor` must be one of 1, 2, 4, 8 or 16. Anything else is ignored
    /// and the current setting stays, callers rely on this to probe values.
    pub fn set_humidity_oversampling(&mut self, factor: u8) -> Result<(), Error<B::Error>> {
        match Oversampling::from_factor(factor) {
            Some(oversampling) => self.apply_humidity(oversampling),
            None => {
                trace!("ignoring illegal humidity oversampling: {factor}");
                Ok(())
            }
        }
    }

    /// `factor` must be one of 1, 2, 4, 8 or 16. Anything else is ignored
    /// and the current setting stays, callers rely on this to probe values.
    pub fn set_pressure_oversampling(&mut self, factor: u8) -> Result<(), Error<B::Error>> {
        match Oversampling::from_factor(factor) {
            Some(oversampling) => self.apply_pressure(oversampling),
            None => {
                trace!("ignoring illegal pressure oversampling: {factor}");
                Ok(())
            }
        }
    }

    /// `factor` must be one of 1, 2, 4, 8 or 16. Anything else is ignored
    /// and the current setting stays, callers rely on this to probe values.
    pub fn set_temperature_oversampling(&mut self, factor: u8) -> Result<(), Error<B::Error>> {
        match Oversampling::from_factor(factor) {
            Some(oversampling) => self.apply_temperature(oversampling),
            None => {
                trace!("ignoring illegal temperature oversampling: {factor}");
                Ok(())
            }
        }
    }

    /// `code` is the register value: 0b00 sleep, 0b01 forced, 0b11 normal.
    /// Other values are ignored like illegal oversampling factors.
    pub fn set_control_mode(&mut self, code: u8) -> Result<(), Error<B::Error>> {
        match Mode::from_code(code) {
            Some(mode) => self.apply_mode(mode),
            None => {
                trace!("ignoring illegal mode: {code:#04b}");
                Ok(())
            }
        }
    }

    fn apply_humidity(&mut self, oversampling: Oversampling) -> Result<(), Error<B::Error>> {
        {
            let mut bus = self.bus.acquire();
            modify_register(&mut bus, self.address, REG_CTRL_HUM, OSRS_MASK, oversampling.code())
                .map_err(Error::Transport)?;
            // ctrl_hum is only latched by a write to ctrl_meas
            modify_register(&mut bus, self.address, REG_CTRL_MEAS, 0, 0)
                .map_err(Error::Transport)?;
        }
        self.commit(Config {
            humidity: oversampling,
            ..self.config
        });
        Ok(())
    }

    fn apply_pressure(&mut self, oversampling: Oversampling) -> Result<(), Error<B::Error>> {
        {
            let mut bus = self.bus.acquire();
            modify_register(
                &mut bus,
                self.address,
                REG_CTRL_MEAS,
                OSRS_MASK << OSRS_P_SHIFT,
                oversampling.code() << OSRS_P_SHIFT,
            )
            .map_err(Error::Transport)?;
        }
        self.commit(Config {
            pressure: oversampling,
            ..self.config
        });
        Ok(())
    }

    fn apply_temperature(&mut self, oversampling: Oversampling) -> Result<(), Error<B::Error>> {
        {
            let mut bus = self.bus.acquire();
            modify_register(
                &mut bus,
                self.address,
                REG_CTRL_MEAS,
                OSRS_MASK << OSRS_T_SHIFT,
                oversampling.code() << OSRS_T_SHIFT,
            )
            .map_err(Error::Transport)?;
        }
        self.commit(Config {
            temperature: oversampling,
            ..self.config
        });
        Ok(())
    }

    fn apply_mode(&mut self, mode: Mode) -> Result<(), Error<B::Error>> {
        {
            let mut bus = self.bus.acquire();
            modify_register(&mut bus, self.address, REG_CTRL_MEAS, MODE_MASK, mode.code())
                .map_err(Error::Transport)?;
        }
        self.commit(Config { mode, ..self.config });
        Ok(())
    }

    /// Only called once the registers hold `config`, the settling delay must
    /// match what the sensor actually does.
    fn commit(&mut self, config: Config) {
        self.config = config;
        self.settling_us = settling_delay_us(&config);
    }

    /// Triggers a conversion (unless the sensor runs in normal mode), waits
    /// for it to finish and reads the adc words. The bus stays locked for
    /// the whole sequence.
    pub fn read_raw(&mut self) -> Result<RawSample, Error<B::Error>> {
        let mut bus = self.bus.acquire();
        if self.config.mode != Mode::Normal {
            modify_register(
                &mut bus,
                self.address,
                REG_CTRL_MEAS,
                MODE_MASK,
                Mode::Forced.code(),
            )
            .map_err(Error::Transport)?;
        }

        self.delay.delay_us(self.settling_us);
        let data = bus
            .read_array::<8>(self.address, REG_DATA)
            .map_err(Error::Transport)?;
        let raw = RawSample::from_burst(&data);
        trace!("raw sample: {raw:?}");
        Ok(raw)
    }

    pub fn read_all(&mut self) -> Result<Measurements, Error<B::Error>> {
        let raw = self.read_raw()?;
        Ok(self.calibration.compensate(raw))
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn config(&self) -> Config {
        self.config
    }

    /// Time waited between triggering a conversion and reading the result.
    pub fn settling_delay(&self) -> Duration {
        Duration::from_micros(u64::from(self.settling_us))
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn release(self) -> (B, D) {
        (self.bus, self.delay)
    }
}

/// Replaces the bits of `register` selected by `mask` leaving the others as
/// the sensor has them.
fn modify_register<R: RegisterBus>(
    bus: &mut R,
    address: u8,
    register: u8,
    mask: u8,
    bits: u8,
) -> Result<(), R::Error> {
    let [current] = bus.read_array::<1>(address, register)?;
    bus.write_byte(address, register, (current & !mask) | (bits & mask))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(1, Oversampling::X1)]
    #[case(2, Oversampling::X2)]
    #[case(4, Oversampling::X4)]
    #[case(8, Oversampling::X8)]
    #[case(16, Oversampling::X16)]
    fn factor_roundtrips(#[case] factor: u8, #[case] expected: Oversampling) {
        let oversampling = Oversampling::from_factor(factor).unwrap();
        assert_eq!(oversampling, expected);
        assert_eq!(oversampling.factor(), factor);
    }

    #[rstest]
    fn illegal_factors(#[values(0, 3, 5, 6, 7, 9, 15, 17, 32, 255)] factor: u8) {
        assert_eq!(Oversampling::from_factor(factor), None);
    }

    #[test]
    fn mode_codes() {
        assert_eq!(Mode::from_code(0), Some(Mode::Sleep));
        assert_eq!(Mode::from_code(1), Some(Mode::Forced));
        assert_eq!(Mode::from_code(2), None);
        assert_eq!(Mode::from_code(3), Some(Mode::Normal));
        assert_eq!(Mode::from_code(4), None);
    }

    #[test]
    fn default_settling_delay() {
        // 1.25 + 4.6 + 4.6 + 0.575 + 4.6 + 0.575 ms
        assert_eq!(settling_delay_us(&Config::default()), 16_200);
    }

    #[test]
    fn settling_delay_grows_with_oversampling() {
        let config = Config {
            temperature: Oversampling::X16,
            ..Config::default()
        };
        assert_eq!(settling_delay_us(&config), 48_400);
    }
}
