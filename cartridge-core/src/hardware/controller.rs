//! Hardware status interface to the drive controller.

use std::fmt;

use crate::error::BusError;

use super::registers::*;

/// Controller firmware version, read once at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A host access reported by the controller's event interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveEvent {
    Seek { cylinder: u8 },
    Read { cylinder: u8, head: u8, sector: u8 },
    Write { cylinder: u8, head: u8, sector: u8 },
    Unknown { operation: u8 },
}

impl DriveEvent {
    /// Decode the 24-bit event word (`0x81` low byte through `0x83`).
    pub fn decode(raw: u32) -> Self {
        let cylinder = (raw & 0xFF) as u8;
        let head = ((raw >> 8) & 0x1) as u8;
        let sector = ((raw >> 12) & 0xF) as u8;
        match ((raw >> 10) & 0x3) as u8 {
            0 => DriveEvent::Seek { cylinder },
            1 => DriveEvent::Read { cylinder, head, sector },
            2 => DriveEvent::Write { cylinder, head, sector },
            operation => DriveEvent::Unknown { operation },
        }
    }
}

/// Byte-addressed access to the controller's cartridge RAM.
pub trait DeviceRam {
    /// Store `data` starting at `address`.
    fn write_block(&mut self, address: u32, data: &[u8]) -> Result<(), BusError>;

    /// Fill `buf` starting at `address`.
    fn read_block(&mut self, address: u32, buf: &mut [u8]) -> Result<(), BusError>;
}

/// The operations the load/unload state machine needs from the drive
/// controller. Reads are idempotent; commands take effect immediately.
pub trait DriveController: DeviceRam {
    fn ready(&mut self) -> Result<bool, BusError>;

    fn fault_latched(&mut self) -> Result<bool, BusError>;

    fn unlocked(&mut self) -> Result<bool, BusError>;

    fn read_only(&mut self) -> Result<bool, BusError>;

    /// True when the controller is backed by a genuine spinning drive.
    fn real_mode(&mut self) -> Result<bool, BusError>;

    /// Drive address strapped on the controller (0-3).
    fn drive_address(&mut self) -> Result<u8, BusError>;

    fn set_cartridge_ready(&mut self, ready: bool) -> Result<(), BusError>;

    fn set_fault_latch(&mut self, latched: bool) -> Result<(), BusError>;

    fn toggle_read_only(&mut self) -> Result<(), BusError>;

    fn firmware_version(&mut self) -> Result<FirmwareVersion, BusError>;

    /// Drive the door servo.
    fn write_servo(&mut self, pulse: u8) -> Result<(), BusError>;

    /// True while the controller's event interrupt line is asserted.
    fn interrupt_pending(&mut self) -> Result<bool, BusError>;

    /// Read the event that raised the controller interrupt. Reading the
    /// high byte acknowledges it.
    fn read_drive_event(&mut self) -> Result<DriveEvent, BusError>;
}

/// A two-byte register transaction: send `(register, data)`, receive the
/// register's value in the second byte.
pub trait RegisterBus {
    fn transfer(&mut self, register: u8, data: u8) -> Result<u8, BusError>;

    /// Level of the interrupt line routed beside the bus.
    fn interrupt_pending(&mut self) -> bool;
}

/// `DriveController` implemented over the register bus.
pub struct RegisterController<B: RegisterBus> {
    bus: B,
}

impl<B: RegisterBus> RegisterController<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn status(&mut self) -> Result<StatusBits, BusError> {
        Ok(StatusBits(self.bus.transfer(REG_STATUS, 0)?))
    }

    fn write(&mut self, register: u8, data: u8) -> Result<(), BusError> {
        self.bus.transfer(register, data).map(|_| ())
    }

    /// Read-modify-write of one control bit.
    fn update_control(&mut self, mask: u8, set: bool) -> Result<(), BusError> {
        let current = self.status()?.0;
        let value = if set { current | mask } else { current & !mask };
        self.write(REG_CONTROL, value)
    }

    fn load_ram_address(&mut self, address: u32) -> Result<(), BusError> {
        self.write(REG_RAM_ADDRESS, (address >> 16) as u8)?;
        self.write(REG_RAM_ADDRESS, (address >> 8) as u8)?;
        self.write(REG_RAM_ADDRESS, address as u8)
    }
}

impl<B: RegisterBus> DeviceRam for RegisterController<B> {
    fn write_block(&mut self, address: u32, data: &[u8]) -> Result<(), BusError> {
        self.load_ram_address(address)?;
        for &byte in data {
            self.write(REG_RAM_DATA, byte)?;
        }
        Ok(())
    }

    fn read_block(&mut self, address: u32, buf: &mut [u8]) -> Result<(), BusError> {
        self.load_ram_address(address)?;
        for byte in buf.iter_mut() {
            *byte = self.bus.transfer(REG_RAM_READ, 0)?;
        }
        Ok(())
    }
}

impl<B: RegisterBus> DriveController for RegisterController<B> {
    fn ready(&mut self) -> Result<bool, BusError> {
        Ok(self.status()?.drive_ready())
    }

    fn fault_latched(&mut self) -> Result<bool, BusError> {
        Ok(self.status()?.fault_latched())
    }

    fn unlocked(&mut self) -> Result<bool, BusError> {
        Ok(self.status()?.unlocked())
    }

    fn read_only(&mut self) -> Result<bool, BusError> {
        Ok(self.status()?.read_only())
    }

    fn real_mode(&mut self) -> Result<bool, BusError> {
        Ok(self.status()?.real_mode())
    }

    fn drive_address(&mut self) -> Result<u8, BusError> {
        Ok(self.status()?.drive_address())
    }

    fn set_cartridge_ready(&mut self, ready: bool) -> Result<(), BusError> {
        self.update_control(BIT_CART_READY, ready)
    }

    fn set_fault_latch(&mut self, latched: bool) -> Result<(), BusError> {
        self.update_control(BIT_FAULT_LATCH, latched)
    }

    fn toggle_read_only(&mut self) -> Result<(), BusError> {
        self.write(REG_COMMAND, CMD_TOGGLE_READ_ONLY)
    }

    fn firmware_version(&mut self) -> Result<FirmwareVersion, BusError> {
        Ok(FirmwareVersion {
            major: self.bus.transfer(REG_VERSION_MAJOR, 0)?,
            minor: self.bus.transfer(REG_VERSION_MINOR, 0)?,
        })
    }

    fn write_servo(&mut self, pulse: u8) -> Result<(), BusError> {
        self.write(REG_SERVO_PULSE, pulse)
    }

    fn interrupt_pending(&mut self) -> Result<bool, BusError> {
        Ok(self.bus.interrupt_pending())
    }

    fn read_drive_event(&mut self) -> Result<DriveEvent, BusError> {
        let low = self.bus.transfer(REG_EVENT_LOW, 0)? as u32;
        let mid = self.bus.transfer(REG_EVENT_MID, 0)? as u32;
        let high = self.bus.transfer(REG_EVENT_HIGH, 0)? as u32;
        Ok(DriveEvent::decode(low | mid << 8 | high << 16))
    }
}
