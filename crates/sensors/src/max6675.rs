//! Maxim max6675 k-type thermocouple amplifier, read only over spi.

use serde::Serialize;

use crate::bus::ClockedBus;
use crate::decode::unsigned16_be;
use crate::Error;

/// What the station has always reported for an unplugged probe.
pub const DISCONNECTED_SENTINEL: f64 = -4096.0;

/// Set when the thermocouple input is open
const OPEN_INPUT: u16 = 0x4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Reading {
    Celsius(f64),
    /// No probe attached. That is a normal state of the station, not an
    /// error.
    Disconnected,
}

impl Reading {
    /// Bits 14..3 hold the temperature in quarter degrees.
    pub fn decode(frame: [u8; 2]) -> Self {
        let value = unsigned16_be(&frame, 0);
        if value & OPEN_INPUT != 0 {
            return Self::Disconnected;
        }
        Self::Celsius(f64::from(value >> 3) * 0.25)
    }

    pub fn celsius(self) -> Option<f64> {
        match self {
            Self::Celsius(value) => Some(value),
            Self::Disconnected => None,
        }
    }

    /// The temperature or [`DISCONNECTED_SENTINEL`], for consumers that
    /// only understand numbers.
    pub fn or_sentinel(self) -> f64 {
        self.celsius().unwrap_or(DISCONNECTED_SENTINEL)
    }
}

pub struct Max6675<S> {
    spi: S,
}

impl<S: ClockedBus> Max6675<S> {
    /// The device should be configured for spi mode 0 at most 4.3 MHz.
    pub fn new(spi: S) -> Self {
        Self { spi }
    }

    pub fn read_celsius(&mut self) -> Result<Reading, Error<S::Error>> {
        let mut frame = [0u8; 2];
        self.spi
            .read_bytes(&mut frame)
            .map_err(Error::Transport)?;
        Ok(Reading::decode(frame))
    }

    pub fn release(self) -> S {
        self.spi
    }
}
