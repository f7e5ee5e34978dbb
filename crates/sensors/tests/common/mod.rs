#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self, ErrorKind, I2c, NoAcknowledgeSource, Operation};

#[derive(Debug)]
struct Registers {
    memory: [u8; 256],
    pointer: u8,
    writes: Vec<(u8, u8)>,
    transfers: usize,
    failing: bool,
}

/// A device that behaves like most i2c sensors: the first byte written
/// selects a register, further bytes are written to it and the registers
/// after it, reads continue from where the pointer is.
///
/// Clones share the registers so a test can look at them while a driver
/// owns the bus.
#[derive(Debug, Clone)]
pub struct RegisterMap {
    address: u8,
    state: Arc<Mutex<Registers>>,
}

impl RegisterMap {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            state: Arc::new(Mutex::new(Registers {
                memory: [0; 256],
                pointer: 0,
                writes: Vec::new(),
                transfers: 0,
                failing: false,
            })),
        }
    }

    pub fn set(&self, register: u8, bytes: &[u8]) {
        let mut state = self.state.lock().unwrap();
        let start = usize::from(register);
        state.memory[start..start + bytes.len()].copy_from_slice(bytes);
    }

    pub fn get(&self, register: u8) -> u8 {
        self.state.lock().unwrap().memory[usize::from(register)]
    }

    /// Register, value pairs in the order the driver wrote them.
    pub fn writes(&self) -> Vec<(u8, u8)> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn transfers(&self) -> usize {
        self.state.lock().unwrap().transfers
    }

    /// Every transfer from now on ends in a bus error.
    pub fn break_bus(&self) {
        self.state.lock().unwrap().failing = true;
    }
}

impl i2c::ErrorType for RegisterMap {
    type Error = ErrorKind;
}

impl I2c for RegisterMap {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), ErrorKind> {
        if address != self.address {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }

        let mut state = self.state.lock().unwrap();
        if state.failing {
            return Err(ErrorKind::Bus);
        }
        state.transfers += 1;

        for operation in operations {
            match operation {
                Operation::Write(bytes) => {
                    let Some((register, values)) = bytes.split_first() else {
                        continue;
                    };
                    state.pointer = *register;
                    for value in values {
                        let pointer = state.pointer;
                        state.memory[usize::from(pointer)] = *value;
                        state.writes.push((pointer, *value));
                        state.pointer = pointer.wrapping_add(1);
                    }
                }
                Operation::Read(buf) => {
                    for byte in buf.iter_mut() {
                        let pointer = state.pointer;
                        *byte = state.memory[usize::from(pointer)];
                        state.pointer = pointer.wrapping_add(1);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Remembers every wait instead of sleeping.
#[derive(Debug, Default, Clone)]
pub struct RecordingDelay(Arc<Mutex<Vec<u32>>>);

impl RecordingDelay {
    pub fn waits(&self) -> Vec<Duration> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .map(|ns| Duration::from_nanos(u64::from(*ns)))
            .collect()
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.lock().unwrap().push(ns);
    }
}
