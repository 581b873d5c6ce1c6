//! Drive state owned by the emulator and mutated by the state machine.

use std::fmt;

use crate::error::CartridgeFault;
use crate::hardware::{FirmwareVersion, SwitchReading};
use crate::storage::ImageHeader;

/// Position in the load/unload protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunLoadState {
    Idle,
    AwaitMedia,
    MountFs,
    OpenImage,
    ReadHeader,
    CloseDoor,
    LoadData,
    CloseAfterLoad,
    ReadyWait,
    Running,
    UnloadStart,
    OpenImageWrite,
    WriteHeader,
    WriteData,
    CloseAfterWrite,
    OpenDoor,
    AbortNoWriteback,
    LoadError,
    LoadErrorOn,
    LoadErrorOff,
    DoorOpenRecover,
    UnloadError,
    UnloadErrorOn,
    UnloadErrorOff,
    DoorCloseRecover,
}

impl RunLoadState {
    /// States belonging to the flashing-fault tracks.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            RunLoadState::LoadError
                | RunLoadState::LoadErrorOn
                | RunLoadState::LoadErrorOff
                | RunLoadState::UnloadError
                | RunLoadState::UnloadErrorOn
                | RunLoadState::UnloadErrorOff
        )
    }
}

impl fmt::Display for RunLoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Emulated medium geometry, from the image header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geometry {
    /// Controller type label, e.g. "IBM 1130".
    pub controller: String,
    /// Bits per second.
    pub bit_rate: u32,
    pub cylinders: u32,
    /// Sector marks per track; two per 321-word sector.
    pub sectors_per_track: u32,
    pub heads: u32,
    pub microseconds_per_sector: u32,
}

impl Default for Geometry {
    /// IBM 1130 with a 2310 drive and 2315 cartridge.
    fn default() -> Self {
        Self {
            controller: "IBM 1130".to_string(),
            bit_rate: 720_000,
            cylinders: 203,
            sectors_per_track: 8,
            heads: 2,
            microseconds_per_sector: 5000,
        }
    }
}

/// Descriptive fields of the image header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CartridgeLabel {
    pub id: String,
    pub description: String,
    pub date: String,
}

/// Flash countdown for the fault lamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorIndicator {
    counter: u16,
}

impl ErrorIndicator {
    pub fn arm(&mut self, ticks: u16) {
        self.counter = ticks;
    }

    pub fn remaining(&self) -> u16 {
        self.counter
    }

    /// Count one tick. Returns true when the current phase has run out.
    pub fn tick(&mut self) -> bool {
        self.counter = self.counter.saturating_sub(1);
        self.counter == 0
    }
}

#[derive(Debug, Clone)]
pub struct DriveState {
    pub state: RunLoadState,
    pub run_load_switch: bool,
    pub write_protect_switch: bool,
    pub previous_write_protect_switch: bool,
    /// Image loaded and the drive has come ready.
    pub file_ready: bool,
    pub fault_latched: bool,
    pub dc_low: bool,
    pub power_failed: bool,
    pub drive_address: u8,
    pub fixed_mode: bool,
    pub board_version: u8,
    pub controller_version: FirmwareVersion,
    pub geometry: Geometry,
    pub label: CartridgeLabel,
    /// Valid only while `file_ready`.
    pub image_name: String,
    pub indicator: ErrorIndicator,
    pub last_fault: Option<CartridgeFault>,
}

impl DriveState {
    pub fn new(drive_address: u8, fixed_mode: bool) -> Self {
        Self {
            state: RunLoadState::Idle,
            run_load_switch: false,
            write_protect_switch: false,
            previous_write_protect_switch: false,
            file_ready: false,
            fault_latched: false,
            dc_low: false,
            power_failed: false,
            drive_address,
            fixed_mode,
            board_version: 0,
            controller_version: FirmwareVersion::default(),
            geometry: Geometry::default(),
            label: CartridgeLabel::default(),
            image_name: String::new(),
            indicator: ErrorIndicator::default(),
            last_fault: None,
        }
    }

    /// Latch a new switch sample. Returns true on a write-protect rising edge.
    pub fn update_switches(&mut self, reading: SwitchReading) -> bool {
        self.previous_write_protect_switch = self.write_protect_switch;
        self.run_load_switch = reading.run_load;
        self.write_protect_switch = reading.write_protect;
        self.write_protect_switch && !self.previous_write_protect_switch
    }

    /// Adopt the geometry and label of a freshly read header.
    pub fn apply_header(&mut self, header: &ImageHeader, image_name: &str) {
        self.geometry = header.geometry.clone();
        self.label = header.label.clone();
        self.image_name = image_name.to_string();
    }

    /// Forget the unloaded cartridge.
    pub fn reset_cartridge(&mut self) {
        self.geometry = Geometry::default();
        self.label = CartridgeLabel::default();
        self.image_name.clear();
        self.file_ready = false;
    }

    /// Header describing the loaded cartridge, for writeback.
    pub fn to_header(&self) -> ImageHeader {
        ImageHeader {
            label: self.label.clone(),
            geometry: self.geometry.clone(),
        }
    }

    /// Image name for the identity screen, blank unless loaded.
    pub fn displayed_name(&self) -> &str {
        if self.file_ready {
            &self.image_name
        } else {
            ""
        }
    }
}
