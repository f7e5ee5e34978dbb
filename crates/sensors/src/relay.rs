//! Relay outputs: something that can be switched on and off and asked what
//! it is at.

use core::fmt;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::str::FromStr;

use embedded_hal::digital::{OutputPin, PinState, StatefulOutputPin};

pub trait DigitalOutput {
    type Error: fmt::Debug;

    fn set_state(&mut self, on: bool) -> Result<(), Self::Error>;
    fn get_state(&mut self) -> Result<bool, Self::Error>;
}

impl<P: StatefulOutputPin> DigitalOutput for P {
    type Error = P::Error;

    fn set_state(&mut self, on: bool) -> Result<(), P::Error> {
        OutputPin::set_state(self, PinState::from(on))
    }

    fn get_state(&mut self) -> Result<bool, P::Error> {
        self.is_set_high()
    }
}

/// Gpio lines wired to the i2c, uart and spi buses. Driving them would take
/// the sensors down.
pub const RESERVED_PINS: [(&str, u32); 9] = [
    ("sda", 2),
    ("scl", 3),
    ("tx", 14),
    ("rx", 15),
    ("mosi", 10),
    ("miso", 9),
    ("sclk", 11),
    ("ce0", 8),
    ("ce1", 7),
];

fn reserved_name(pin: u32) -> Option<&'static str> {
    RESERVED_PINS
        .iter()
        .find(|(_, reserved)| *reserved == pin)
        .map(|(name, _)| *name)
}

/// A relay as given by the user, either its configured name or the gpio
/// line number. Resolved to a line number by [`RelayTable::resolve`] before
/// any hardware is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinId {
    ByName(String),
    ByNumber(u32),
}

impl FromStr for PinId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse() {
            Ok(number) => Self::ByNumber(number),
            Err(_) => Self::ByName(s.to_owned()),
        })
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinId::ByName(name) => write!(f, "relay `{name}`"),
            PinId::ByNumber(pin) => write!(f, "gpio {pin}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("Gpio {pin} is already used by relay `{by}`")]
    PinInUse { pin: u32, by: String },
    #[error("There already is a relay called `{0}`")]
    NameInUse(String),
    #[error("Gpio {pin} is the {bus} line of a bus")]
    ReservedPin { pin: u32, bus: &'static str },
    #[error("No relay called `{0}`")]
    UnknownName(String),
}

/// Relay names to gpio line numbers.
#[derive(Debug, Default, Clone)]
pub struct RelayTable {
    pins: BTreeMap<String, u32>,
}

impl RelayTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_relay(&mut self, name: impl Into<String>, pin: u32) -> Result<(), RelayError> {
        let name = name.into();
        if let Some(bus) = reserved_name(pin) {
            return Err(RelayError::ReservedPin { pin, bus });
        }
        if let Some((by, _)) = self.pins.iter().find(|(_, used)| **used == pin) {
            return Err(RelayError::PinInUse {
                pin,
                by: by.clone(),
            });
        }
        if self.pins.contains_key(&name) {
            return Err(RelayError::NameInUse(name));
        }
        self.pins.insert(name, pin);
        Ok(())
    }

    pub fn relays(&self) -> impl Iterator<Item = (&str, u32)> {
        self.pins.iter().map(|(name, pin)| (name.as_str(), *pin))
    }

    pub fn resolve(&self, id: &PinId) -> Result<u32, RelayError> {
        let pin = match id {
            PinId::ByName(name) => *self
                .pins
                .get(name)
                .ok_or_else(|| RelayError::UnknownName(name.clone()))?,
            PinId::ByNumber(pin) => *pin,
        };
        match reserved_name(pin) {
            Some(bus) => Err(RelayError::ReservedPin { pin, bus }),
            None => Ok(pin),
        }
    }
}
