//! Virtual 2315 Cartridge Facility core
//!
//! This crate provides the firmware logic of a cartridge disk drive emulator:
//! - Load/unload protocol state machine
//! - Door actuator sequencer
//! - Supply voltage monitor with hysteresis
//! - Drive controller register interface
//!
//! # Architecture
//!
//! The emulator is tick driven. Each tick the `Emulator` samples the front
//! panel and power monitor, advances the door, and runs one step of the
//! state machine against its collaborators:
//! - `DriveController` trait: status bits and commands of the drive controller
//! - `FrontPanel` trait: switches, lamps and power lines
//! - `ImageStore` trait: cartridge image files on removable media
//! - `Display` trait: two-line status display

pub mod actuator;
pub mod config;
pub mod console;
pub mod display;
pub mod emulator;
pub mod error;
pub mod hardware;
pub mod machine;
pub mod power;
pub mod state;
pub mod storage;

pub use actuator::{DoorActuator, DoorDirection, DoorStatus};
pub use config::{ActuatorConfig, EmulatorConfig, FlashConfig, PowerConfig};
pub use console::{ConsoleCommand, Mailbox};
pub use display::{Display, HeadlessDisplay, Screen};
pub use emulator::Emulator;
pub use error::{BusError, CartridgeFault, EmulatorError, EmulatorResult};
pub use hardware::{
    DeviceRam, DriveController, DriveEvent, FirmwareVersion, FrontPanel, Lamp, RegisterBus,
    RegisterController, SimulatedBus, SimulatedPanel, SwitchReading,
};
pub use machine::{StepContext, TRANSITIONS};
pub use power::{PowerEdge, PowerMonitor};
pub use state::{CartridgeLabel, DriveState, ErrorIndicator, Geometry, RunLoadState};
pub use storage::{
    FailPoint, FileImageStore, HeaderError, ImageHeader, ImageStore, MemoryImageStore,
    StorageError, StorageResult,
};
