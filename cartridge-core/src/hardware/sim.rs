//! Register-level model of the drive controller.
//!
//! Used by the integration tests and the host-side CLI in place of the real
//! companion device. It answers the same register transactions the hardware
//! does and exposes setters for the inputs a real drive would drive.

use crate::error::BusError;

use super::controller::RegisterBus;
use super::registers::*;

/// Enough device RAM for a 203-cylinder, 2-head, 16-sector cartridge.
pub const DEFAULT_RAM_SIZE: usize = 0x20_0000;

#[derive(Debug, Clone)]
pub struct SimulatedBus {
    /// Bits the firmware writes through REG_CONTROL.
    control: u8,
    pub real_mode: bool,
    pub drive_address: u8,
    pub unlocked: bool,
    pub drive_ready: bool,
    pub read_only: bool,
    /// Raise drive-ready whenever cartridge-ready is asserted.
    pub auto_ready: bool,
    /// Fail every transaction while set.
    pub failing: bool,
    pub version: (u8, u8),
    event: u32,
    interrupt: bool,
    servo: Option<u8>,
    servo_writes: usize,
    ram: Vec<u8>,
    ram_address: u32,
    transactions: usize,
}

impl Default for SimulatedBus {
    fn default() -> Self {
        Self::new(DEFAULT_RAM_SIZE)
    }
}

impl SimulatedBus {
    pub fn new(ram_size: usize) -> Self {
        Self {
            control: 0,
            real_mode: false,
            drive_address: 0,
            unlocked: true,
            drive_ready: false,
            read_only: false,
            auto_ready: false,
            failing: false,
            version: (1, 0),
            event: 0,
            interrupt: false,
            servo: None,
            servo_writes: 0,
            ram: vec![0; ram_size],
            ram_address: 0,
            transactions: 0,
        }
    }

    /// Current value of the status register.
    pub fn status(&self) -> u8 {
        let mut bits = self.control & CONTROL_WRITABLE;
        let ready = if self.auto_ready {
            self.cartridge_ready()
        } else {
            self.drive_ready
        };
        if self.real_mode {
            bits |= BIT_REAL_MODE;
        }
        bits |= (self.drive_address << 1) & MASK_DRIVE_ADDRESS;
        if self.unlocked {
            bits |= BIT_CART_UNLOCKED;
        }
        if ready {
            bits |= BIT_DRIVE_READY;
        }
        if self.read_only {
            bits |= BIT_READ_ONLY;
        }
        bits
    }

    pub fn cartridge_ready(&self) -> bool {
        self.control & BIT_CART_READY != 0
    }

    pub fn fault_latched(&self) -> bool {
        self.control & BIT_FAULT_LATCH != 0
    }

    /// Latch a drive fault, as the controller does on a seek or data error.
    pub fn raise_fault(&mut self) {
        self.control |= BIT_FAULT_LATCH;
    }

    /// Post a drive event and assert the interrupt line until the event
    /// registers are read.
    pub fn raise_event(&mut self, raw: u32) {
        self.event = raw;
        self.interrupt = true;
    }

    /// Last pulse width written to the door servo.
    pub fn servo_pulse(&self) -> Option<u8> {
        self.servo
    }

    pub fn servo_writes(&self) -> usize {
        self.servo_writes
    }

    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    pub fn ram_mut(&mut self) -> &mut [u8] {
        &mut self.ram
    }

    /// Number of register transactions served so far.
    pub fn transactions(&self) -> usize {
        self.transactions
    }

    fn ram_slot(&mut self, register: u8) -> Result<usize, BusError> {
        let index = self.ram_address as usize;
        if index >= self.ram.len() {
            return Err(BusError::new(
                register,
                format!("RAM address {:#08X} out of range", self.ram_address),
            ));
        }
        self.ram_address = self.ram_address.wrapping_add(1);
        Ok(index)
    }
}

impl RegisterBus for SimulatedBus {
    fn transfer(&mut self, register: u8, data: u8) -> Result<u8, BusError> {
        if self.failing {
            return Err(BusError::new(register, "no response from controller"));
        }
        self.transactions += 1;

        match register {
            REG_CONTROL => {
                self.control = data & CONTROL_WRITABLE;
                Ok(0)
            }
            REG_COMMAND => {
                if data & CMD_TOGGLE_READ_ONLY != 0 {
                    self.read_only = !self.read_only;
                }
                Ok(0)
            }
            REG_RAM_ADDRESS => {
                self.ram_address = (self.ram_address << 8 | data as u32) & 0x00FF_FFFF;
                Ok(0)
            }
            REG_RAM_DATA => {
                let index = self.ram_slot(register)?;
                self.ram[index] = data;
                Ok(0)
            }
            REG_RAM_READ => {
                let index = self.ram_slot(register)?;
                Ok(self.ram[index])
            }
            REG_SERVO_PULSE => {
                self.servo = Some(data);
                self.servo_writes += 1;
                Ok(0)
            }
            REG_EVENT_LOW => Ok(self.event as u8),
            REG_EVENT_MID => Ok((self.event >> 8) as u8),
            REG_EVENT_HIGH => {
                self.interrupt = false;
                Ok((self.event >> 16) as u8)
            }
            REG_VERSION_MAJOR => Ok(self.version.0),
            REG_VERSION_MINOR => Ok(self.version.1),
            REG_STATUS => Ok(self.status()),
            _ => Err(BusError::new(register, "unmapped register")),
        }
    }

    fn interrupt_pending(&mut self) -> bool {
        !self.failing && self.interrupt
    }
}
