//! Disk image storage.
//!
//! This module provides the cartridge image layer:
//! - `ImageStore`: mount/open/read/write/close contract the state machine drives
//! - `FileImageStore`: images in a directory standing in for the flash media
//! - `MemoryImageStore`: in-memory image with failure injection
//! - `image`: header codec and payload streaming shared by both

pub mod image;
mod file_store;
mod memory_store;

use thiserror::Error;

use crate::error::BusError;
use crate::hardware::DeviceRam;
use crate::state::Geometry;

pub use file_store::FileImageStore;
pub use image::{HeaderError, ImageHeader, HEADER_LEN, SECTOR_BYTES};
pub use memory_store::{FailPoint, MemoryImageStore};

/// Storage-layer failures.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("no media inserted")]
    NoMedia,

    #[error("mount failed: {0}")]
    Mount(String),

    #[error("filesystem not mounted")]
    NotMounted,

    #[error("no image file open")]
    NotOpen,

    #[error("bad image header: {0}")]
    Header(#[from] HeaderError),

    #[error("image payload ends early: expected {expected} bytes")]
    ShortRead { expected: usize },

    #[error("device RAM transfer failed: {0}")]
    Device(#[from] BusError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage operations the load/unload protocol performs, one per tick.
///
/// At most one image is open at a time. Every operation returns promptly;
/// nothing here retries.
pub trait ImageStore {
    /// Is removable media inserted?
    fn media_present(&mut self) -> bool;

    /// Mount the media filesystem.
    fn mount(&mut self) -> StorageResult<()>;

    /// Open the image for reading.
    fn open_read(&mut self) -> StorageResult<()>;

    /// Read and validate the header of the image opened for reading.
    fn read_header(&mut self) -> StorageResult<ImageHeader>;

    /// Stream the payload described by `geometry` into device RAM.
    fn read_data(&mut self, geometry: &Geometry, ram: &mut dyn DeviceRam) -> StorageResult<()>;

    /// Open (and truncate) the image for writeback.
    fn open_write(&mut self) -> StorageResult<()>;

    fn write_header(&mut self, header: &ImageHeader) -> StorageResult<()>;

    /// Stream the payload described by `geometry` out of device RAM.
    fn write_data(&mut self, geometry: &Geometry, ram: &mut dyn DeviceRam) -> StorageResult<()>;

    /// Release the open image, flushing any pending writes.
    fn close(&mut self) -> StorageResult<()>;

    /// Name of the image file on the media.
    fn image_name(&self) -> &str;
}
