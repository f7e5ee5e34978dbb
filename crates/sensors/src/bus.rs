//! The byte level transport the drivers talk through.
//!
//! Drivers never touch embedded-hal directly, they go through
//! [`RegisterBus`] (i2c, register addressed) or [`ClockedBus`] (spi). Both
//! are implemented for every embedded-hal 1.0 bus so a
//! `linux_embedded_hal::I2cdev` or `SpidevDevice` works as is.
//!
//! A sensor read is a write, sleep, read sequence. Two drivers interleaving
//! their sequences on one physical bus corrupt each other's results. A
//! driver therefore asks its [`Bus`] for exclusive access once per sequence
//! and only then starts transferring. Give each driver on a shared bus a
//! clone of the same [`SharedBus`].

use core::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embedded_hal::i2c::{self, I2c, Operation};
use embedded_hal::spi::{self, SpiDevice};

pub trait RegisterBus {
    type Error: fmt::Debug;

    /// Sets `register` of the device at `address` to `value`.
    fn write_byte(&mut self, address: u8, register: u8, value: u8) -> Result<(), Self::Error>;
    /// Sends a single command byte, without a register.
    fn write_command(&mut self, address: u8, command: u8) -> Result<(), Self::Error>;
    /// Writes `bytes` to consecutive registers starting at `register`.
    fn write_block(&mut self, address: u8, register: u8, bytes: &[u8]) -> Result<(), Self::Error>;
    /// Fills `buf` from consecutive registers starting at `register`.
    fn read_block(&mut self, address: u8, register: u8, buf: &mut [u8]) -> Result<(), Self::Error>;

    fn read_array<const N: usize>(&mut self, address: u8, register: u8) -> Result<[u8; N], Self::Error> {
        let mut buf = [0u8; N];
        self.read_block(address, register, &mut buf)?;
        Ok(buf)
    }
}

impl<T: I2c> RegisterBus for T {
    type Error = <T as i2c::ErrorType>::Error;

    fn write_byte(
        &mut self,
        address: u8,
        register: u8,
        value: u8,
    ) -> Result<(), <T as i2c::ErrorType>::Error> {
        self.write(address, &[register, value])
    }

    fn write_command(
        &mut self,
        address: u8,
        command: u8,
    ) -> Result<(), <T as i2c::ErrorType>::Error> {
        self.write(address, &[command])
    }

    fn write_block(
        &mut self,
        address: u8,
        register: u8,
        bytes: &[u8],
    ) -> Result<(), <T as i2c::ErrorType>::Error> {
        // one message: linux i2c-dev turns every transaction operation into
        // its own message with a (repeated) start, the device would take the
        // first payload byte for a register address.
        let mut message = Vec::with_capacity(bytes.len() + 1);
        message.push(register);
        message.extend_from_slice(bytes);
        self.write(address, &message)
    }

    fn read_block(
        &mut self,
        address: u8,
        register: u8,
        buf: &mut [u8],
    ) -> Result<(), <T as i2c::ErrorType>::Error> {
        self.write_read(address, &[register], buf)
    }
}

/// A bus without addresses, the device is selected by its chip select line.
pub trait ClockedBus {
    type Error: fmt::Debug;

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), Self::Error>;
}

impl<T: SpiDevice> ClockedBus for T {
    type Error = <T as spi::ErrorType>::Error;

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), <T as spi::ErrorType>::Error> {
        self.read(buf)
    }
}

/// Something a driver can get exclusive use of a [`RegisterBus`] from. The
/// access lasts until the guard is dropped.
pub trait Bus {
    type Error: fmt::Debug;
    type Guard<'a>: RegisterBus<Error = Self::Error>
    where
        Self: 'a;

    fn acquire(&mut self) -> Self::Guard<'_>;
}

/// A bus owned by a single driver is exclusive by construction.
impl<T: I2c> Bus for T {
    type Error = <T as i2c::ErrorType>::Error;
    type Guard<'a>
        = &'a mut T
    where
        Self: 'a;

    fn acquire(&mut self) -> Self::Guard<'_> {
        self
    }
}

/// Handle to a bus shared between drivers, possibly on different threads.
/// Cloning the handle does not open the bus again.
pub struct SharedBus<T>(Arc<Mutex<T>>);

impl<T> Clone for SharedBus<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> SharedBus<T> {
    pub fn new(bus: T) -> Self {
        Self(Arc::new(Mutex::new(bus)))
    }

    /// Blocks until no other sequence is running on the bus.
    pub fn lock(&self) -> BusGuard<'_, T> {
        // a panic halfway through a sequence leaves the device in some state
        // but the bus itself is fine, the next sequence starts over.
        BusGuard(self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl<T: I2c> Bus for SharedBus<T> {
    type Error = <T as i2c::ErrorType>::Error;
    type Guard<'a>
        = BusGuard<'a, T>
    where
        Self: 'a;

    fn acquire(&mut self) -> Self::Guard<'_> {
        self.lock()
    }
}

pub struct BusGuard<'a, T>(MutexGuard<'a, T>);

impl<T: I2c> i2c::ErrorType for BusGuard<'_, T> {
    type Error = <T as i2c::ErrorType>::Error;
}

impl<T: I2c> I2c for BusGuard<'_, T> {
    fn read(&mut self, address: u8, read: &mut [u8]) -> Result<(), <T as i2c::ErrorType>::Error> {
        self.0.read(address, read)
    }

    fn write(&mut self, address: u8, write: &[u8]) -> Result<(), <T as i2c::ErrorType>::Error> {
        self.0.write(address, write)
    }

    fn write_read(
        &mut self,
        address: u8,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), <T as i2c::ErrorType>::Error> {
        self.0.write_read(address, write, read)
    }

    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), <T as i2c::ErrorType>::Error> {
        self.0.transaction(address, operations)
    }
}
