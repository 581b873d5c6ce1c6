//! Drive controller register map.

// Write registers
pub const REG_CONTROL: u8 = 0x00;
pub const REG_COMMAND: u8 = 0x04;
pub const REG_RAM_ADDRESS: u8 = 0x05;
pub const REG_RAM_DATA: u8 = 0x06;
pub const REG_SERVO_PULSE: u8 = 0x12;

// Read registers
pub const REG_EVENT_LOW: u8 = 0x81;
pub const REG_EVENT_MID: u8 = 0x82;
pub const REG_EVENT_HIGH: u8 = 0x83;
pub const REG_RAM_READ: u8 = 0x88;
pub const REG_VERSION_MAJOR: u8 = 0x90;
pub const REG_VERSION_MINOR: u8 = 0x91;
pub const REG_STATUS: u8 = 0xA0;

// Status/control bits (REG_STATUS readback, REG_CONTROL write)
pub const BIT_REAL_MODE: u8 = 0x01;
pub const MASK_DRIVE_ADDRESS: u8 = 0x06;
pub const BIT_CART_UNLOCKED: u8 = 0x08;
pub const BIT_CART_READY: u8 = 0x10;
pub const BIT_FAULT_LATCH: u8 = 0x20;
pub const BIT_DRIVE_READY: u8 = 0x40;
pub const BIT_READ_ONLY: u8 = 0x80;

// REG_COMMAND bits
pub const CMD_TOGGLE_READ_ONLY: u8 = 0x01;

/// Bits of REG_CONTROL the firmware owns; the rest are driven by the
/// controller and ignored on write.
pub const CONTROL_WRITABLE: u8 = BIT_CART_READY | BIT_FAULT_LATCH;

/// Decoded snapshot of the status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusBits(pub u8);

impl StatusBits {
    fn bit(&self, mask: u8) -> bool {
        self.0 & mask != 0
    }

    pub fn real_mode(&self) -> bool {
        self.bit(BIT_REAL_MODE)
    }

    pub fn drive_address(&self) -> u8 {
        (self.0 & MASK_DRIVE_ADDRESS) >> 1
    }

    pub fn unlocked(&self) -> bool {
        self.bit(BIT_CART_UNLOCKED)
    }

    pub fn cartridge_ready(&self) -> bool {
        self.bit(BIT_CART_READY)
    }

    pub fn fault_latched(&self) -> bool {
        self.bit(BIT_FAULT_LATCH)
    }

    pub fn drive_ready(&self) -> bool {
        self.bit(BIT_DRIVE_READY)
    }

    pub fn read_only(&self) -> bool {
        self.bit(BIT_READ_ONLY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_bits() {
        let bits = StatusBits(BIT_REAL_MODE | 0x04 | BIT_DRIVE_READY | BIT_READ_ONLY);
        assert!(bits.real_mode());
        assert_eq!(bits.drive_address(), 2);
        assert!(bits.drive_ready());
        assert!(bits.read_only());
        assert!(!bits.unlocked());
        assert!(!bits.cartridge_ready());
        assert!(!bits.fault_latched());
    }
}
