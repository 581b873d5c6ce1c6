//! Error types for the cartridge emulator.

use thiserror::Error;

/// A register transaction with the drive controller failed.
///
/// The bus is assumed reliable; when it is not, the condition is fatal and
/// propagates out of the tick loop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("register transaction failed at {register:#04X}: {reason}")]
pub struct BusError {
    pub register: u8,
    pub reason: String,
}

impl BusError {
    pub fn new(register: u8, reason: impl Into<String>) -> Self {
        Self {
            register,
            reason: reason.into(),
        }
    }
}

/// Fatal errors that stop the emulator.
#[derive(Error, Debug)]
pub enum EmulatorError {
    #[error("Controller bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for emulator operations.
pub type EmulatorResult<T> = Result<T, EmulatorError>;

/// Failures detected while loading or unloading a cartridge.
///
/// These never stop the emulator; they route the state machine into one of
/// the flashing-fault states until the operator intervenes.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartridgeFault {
    #[error("no media inserted")]
    MediaAbsent,

    #[error("cannot mount media filesystem")]
    MountFailure,

    #[error("cannot open disk image")]
    ImageOpenFailure,

    #[error("malformed image header")]
    HeaderMalformed,

    #[error("invalid image file type")]
    HeaderBadType,

    #[error("invalid image file version")]
    HeaderBadVersion,

    #[error("board version {board} cannot support {sectors} sectors")]
    GeometryUnsupportedByBoard { sectors: u32, board: u8 },

    #[error("image payload of {bytes} bytes exceeds {capacity} bytes of device RAM")]
    GeometryExceedsRam { bytes: u64, capacity: u32 },

    #[error("cannot read image data")]
    DataReadFailure,

    #[error("cannot write image header")]
    HeaderWriteFailure,

    #[error("cannot write image data")]
    DataWriteFailure,

    #[error("cannot close disk image")]
    ImageCloseFailure,
}

impl CartridgeFault {
    /// The two display lines shown for this fault.
    ///
    /// Open and close failures read differently on the way out than on the
    /// way in, so the caller says which track it is on.
    pub fn display_lines(&self, unloading: bool) -> (&'static str, &'static str) {
        match self {
            CartridgeFault::MediaAbsent => ("no microSD", "inserted"),
            CartridgeFault::MountFailure => ("cannot init", "microSD card"),
            CartridgeFault::ImageOpenFailure if unloading => ("image file", "open failed"),
            CartridgeFault::ImageOpenFailure => ("cannot open", "disk image"),
            CartridgeFault::HeaderMalformed => ("cannot read", "image header"),
            CartridgeFault::HeaderBadType => ("invalid", "file type"),
            CartridgeFault::HeaderBadVersion => ("invalid", "file ver"),
            CartridgeFault::GeometryUnsupportedByBoard { .. } => ("> max", "sectors"),
            CartridgeFault::GeometryExceedsRam { .. } => ("image too", "large"),
            CartridgeFault::DataReadFailure => ("cannot read", "image data"),
            CartridgeFault::HeaderWriteFailure => ("image header", "write fail"),
            CartridgeFault::DataWriteFailure => ("image data", "write fail"),
            CartridgeFault::ImageCloseFailure if unloading => ("image file", "close fail"),
            CartridgeFault::ImageCloseFailure => ("cannot close", "image file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_error_converts_to_emulator_error() {
        let err: EmulatorError = BusError::new(0xA0, "timeout").into();
        assert!(matches!(err, EmulatorError::Bus(_)));
        assert_eq!(
            err.to_string(),
            "Controller bus error: register transaction failed at 0xA0: timeout"
        );
    }

    #[test]
    fn test_fault_lines_depend_on_track() {
        assert_eq!(
            CartridgeFault::ImageCloseFailure.display_lines(false),
            ("cannot close", "image file")
        );
        assert_eq!(
            CartridgeFault::ImageCloseFailure.display_lines(true),
            ("image file", "close fail")
        );
        assert_eq!(
            CartridgeFault::MediaAbsent.display_lines(true),
            CartridgeFault::MediaAbsent.display_lines(false)
        );
    }
}
