//! Door actuator sequencer.
//!
//! The cartridge door is driven by a hobby servo. Its position is tracked as
//! an abstract duty factor from 0 (open) to `motor_max` (closed), advanced one
//! unit per tick, and mapped through a lookup table to the pulse width the
//! drive controller writes to the servo.

use crate::config::ActuatorConfig;

/// Direction the door is travelling (or last travelled).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorDirection {
    Opening,
    Closing,
}

/// Door position as reported to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorStatus {
    Open,
    Closed,
    Moving,
}

#[derive(Debug, Clone)]
pub struct DoorActuator {
    duty: u8,
    direction: DoorDirection,
    motor_max: u8,
    table: Vec<u8>,
}

impl DoorActuator {
    /// Create an actuator resting at the closed end.
    ///
    /// `config` must already be validated: the table has `motor_max + 1`
    /// entries.
    pub fn new(config: &ActuatorConfig) -> Self {
        Self {
            duty: config.motor_max,
            direction: DoorDirection::Closing,
            motor_max: config.motor_max,
            table: config.duty_table.clone(),
        }
    }

    /// Start closing. The current position is kept, so a reversal mid-travel
    /// ramps back from where the door is.
    pub fn close(&mut self) {
        self.direction = DoorDirection::Closing;
    }

    /// Start opening.
    pub fn open(&mut self) {
        self.direction = DoorDirection::Opening;
    }

    pub fn duty(&self) -> u8 {
        self.duty
    }

    pub fn direction(&self) -> DoorDirection {
        self.direction
    }

    pub fn motor_max(&self) -> u8 {
        self.motor_max
    }

    /// Pulse width for the current position.
    pub fn pulse(&self) -> u8 {
        self.table[self.duty as usize]
    }

    /// True while the door has not reached the end it is heading for.
    pub fn is_moving(&self) -> bool {
        self.status() == DoorStatus::Moving
    }

    pub fn status(&self) -> DoorStatus {
        match self.direction {
            DoorDirection::Closing if self.duty >= self.motor_max => DoorStatus::Closed,
            DoorDirection::Opening if self.duty == 0 => DoorStatus::Open,
            _ => DoorStatus::Moving,
        }
    }

    /// Move one unit toward the target end and return the new status with
    /// the pulse width to drive.
    pub fn advance(&mut self) -> (DoorStatus, u8) {
        self.duty = match self.direction {
            DoorDirection::Closing => self.duty.saturating_add(1).min(self.motor_max),
            DoorDirection::Opening => self.duty.saturating_sub(1),
        };
        (self.status(), self.pulse())
    }
}
