//! Which sensors are attached where, and looking them up by name.

use std::collections::BTreeMap;
use std::path::Path;
use std::{fs, io};

use tracing::debug;

/// Drivers by name, iterated in name order.
#[derive(Debug)]
pub struct Registry<D> {
    devices: BTreeMap<String, D>,
}

impl<D> Default for Registry<D> {
    fn default() -> Self {
        Self {
            devices: BTreeMap::new(),
        }
    }
}

impl<D> Registry<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the driver previously registered under `name`, if any.
    pub fn insert(&mut self, name: impl Into<String>, driver: D) -> Option<D> {
        self.devices.insert(name.into(), driver)
    }

    pub fn get(&self, name: &str) -> Option<&D> {
        self.devices.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut D> {
        self.devices.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<D> {
        self.devices.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut D)> {
        self.devices
            .iter_mut()
            .map(|(name, driver)| (name.as_str(), driver))
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl<D> IntoIterator for Registry<D> {
    type Item = (String, D);
    type IntoIter = std::collections::btree_map::IntoIter<String, D>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.into_iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Bme280,
    Ms5611,
}

impl SensorKind {
    /// The kind follows from the name: `bme280_outside` is a bme280.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        if name.starts_with("bme280") {
            Some(Self::Bme280)
        } else if name.starts_with("ms5611") {
            Some(Self::Ms5611)
        } else {
            None
        }
    }
}

/// A line from the device list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    pub name: String,
    pub address: u8,
}

impl DeviceEntry {
    pub fn kind(&self) -> Option<SensorKind> {
        SensorKind::from_name(&self.name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceListError {
    #[error("Could not read device list: {0}")]
    Io(#[from] io::Error),
    #[error("Line {line}: expected `<name> <hex address>`, got: {content}")]
    Malformed { line: usize, content: String },
    #[error("Line {line}: {value} is not a hexadecimal i2c address")]
    BadAddress { line: usize, value: String },
}

/// Parses lines of `<name> <address>` where the address is hexadecimal,
/// for example `bme280 0x76`. Empty lines and lines starting with `#` are
/// skipped.
pub fn parse_device_list(text: &str) -> Result<Vec<DeviceEntry>, DeviceListError> {
    let mut entries = Vec::new();
    for (idx, content) in text.lines().enumerate() {
        let line = idx + 1;
        let content = content.trim();
        if content.is_empty() || content.starts_with('#') {
            continue;
        }

        let mut parts = content.split_whitespace();
        let (Some(name), Some(address), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(DeviceListError::Malformed {
                line,
                content: content.to_owned(),
            });
        };

        let digits = address
            .strip_prefix("0x")
            .or_else(|| address.strip_prefix("0X"))
            .unwrap_or(address);
        let address = u8::from_str_radix(digits, 16).map_err(|_| DeviceListError::BadAddress {
            line,
            value: address.to_owned(),
        })?;

        entries.push(DeviceEntry {
            name: name.to_owned(),
            address,
        });
    }
    Ok(entries)
}

/// A missing file is not an error, it means nothing is configured.
pub fn load_device_list(path: &Path) -> Result<Vec<DeviceEntry>, DeviceListError> {
    match fs::read_to_string(path) {
        Ok(text) => parse_device_list(&text),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("no device list at {}", path.display());
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}
