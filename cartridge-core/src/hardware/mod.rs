//! Hardware abstraction.
//!
//! - `DriveController`: status bits and commands of the companion drive
//!   controller, with `RegisterController` implementing it over a
//!   `RegisterBus`.
//! - `FrontPanel`: switches, lamps and the board-level power lines.
//!
//! `SimulatedBus` and `SimulatedPanel` stand in for the hardware in tests and
//! in the host CLI.

mod controller;
mod panel;
pub mod registers;
mod sim;

pub use controller::{
    DeviceRam, DriveController, DriveEvent, FirmwareVersion, RegisterBus, RegisterController,
};
pub use panel::{FrontPanel, Lamp, SimulatedPanel, SwitchReading};
pub use sim::{SimulatedBus, DEFAULT_RAM_SIZE};
