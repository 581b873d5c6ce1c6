//! In-memory image store.

use std::io;

use super::image::{load_payload, payload_len, store_payload, ImageHeader, HEADER_LEN};
use super::{ImageStore, StorageError, StorageResult};
use crate::hardware::DeviceRam;
use crate::state::Geometry;

/// Storage operation to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Mount,
    OpenRead,
    ReadData,
    OpenWrite,
    WriteHeader,
    WriteData,
    /// Fail the close of an image opened for reading.
    CloseRead,
    /// Fail the close of an image opened for writing.
    CloseWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Read,
    Write,
}

/// A single image held in memory, for tests.
#[derive(Debug, Clone)]
pub struct MemoryImageStore {
    name: String,
    image: Vec<u8>,
    present: bool,
    mounted: bool,
    mode: Option<Mode>,
    cursor: usize,
    fail: Option<FailPoint>,
    closes: usize,
    writebacks: usize,
}

impl MemoryImageStore {
    /// Store holding raw image bytes.
    pub fn new(name: impl Into<String>, image: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            image,
            present: true,
            mounted: false,
            mode: None,
            cursor: 0,
            fail: None,
            closes: 0,
            writebacks: 0,
        }
    }

    /// Store holding a well-formed image with `header` and `payload`.
    pub fn with_image(name: impl Into<String>, header: &ImageHeader, payload: &[u8]) -> Self {
        let mut image = header.encode().to_vec();
        image.extend_from_slice(payload);
        Self::new(name, image)
    }

    /// Store with no media inserted.
    pub fn empty() -> Self {
        let mut store = Self::new("2315.dsk", Vec::new());
        store.present = false;
        store
    }

    pub fn set_present(&mut self, present: bool) {
        self.present = present;
    }

    pub fn fail_at(&mut self, point: FailPoint) {
        self.fail = Some(point);
    }

    pub fn clear_failure(&mut self) {
        self.fail = None;
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// Payload bytes following the header.
    pub fn payload(&self) -> &[u8] {
        self.image.get(HEADER_LEN..).unwrap_or(&[])
    }

    pub fn is_open(&self) -> bool {
        self.mode.is_some()
    }

    pub fn closes(&self) -> usize {
        self.closes
    }

    /// Number of images opened for writeback.
    pub fn writebacks(&self) -> usize {
        self.writebacks
    }

    fn check(&self, point: FailPoint) -> StorageResult<()> {
        if self.fail == Some(point) {
            Err(StorageError::Io(io::Error::other(format!(
                "injected failure at {point:?}"
            ))))
        } else {
            Ok(())
        }
    }

    fn require(&self, mode: Mode) -> StorageResult<()> {
        if self.mode == Some(mode) {
            Ok(())
        } else {
            Err(StorageError::NotOpen)
        }
    }
}

impl ImageStore for MemoryImageStore {
    fn media_present(&mut self) -> bool {
        self.present
    }

    fn mount(&mut self) -> StorageResult<()> {
        if !self.present {
            return Err(StorageError::NoMedia);
        }
        if self.fail == Some(FailPoint::Mount) {
            return Err(StorageError::Mount("injected failure".into()));
        }
        self.mounted = true;
        Ok(())
    }

    fn open_read(&mut self) -> StorageResult<()> {
        if !self.mounted {
            return Err(StorageError::NotMounted);
        }
        self.check(FailPoint::OpenRead)?;
        self.mode = Some(Mode::Read);
        self.cursor = 0;
        Ok(())
    }

    fn read_header(&mut self) -> StorageResult<ImageHeader> {
        self.require(Mode::Read)?;
        let mut reader = &self.image[self.cursor..];
        let header = ImageHeader::read_from(&mut reader)?;
        self.cursor += HEADER_LEN;
        Ok(header)
    }

    fn read_data(&mut self, geometry: &Geometry, ram: &mut dyn DeviceRam) -> StorageResult<()> {
        self.require(Mode::Read)?;
        self.check(FailPoint::ReadData)?;
        let mut reader = self.image.get(self.cursor..).unwrap_or(&[]);
        load_payload(&mut reader, geometry, ram)?;
        self.cursor += payload_len(geometry).unwrap_or_default();
        Ok(())
    }

    fn open_write(&mut self) -> StorageResult<()> {
        if !self.mounted {
            return Err(StorageError::NotMounted);
        }
        self.check(FailPoint::OpenWrite)?;
        self.image.clear();
        self.mode = Some(Mode::Write);
        self.writebacks += 1;
        Ok(())
    }

    fn write_header(&mut self, header: &ImageHeader) -> StorageResult<()> {
        self.require(Mode::Write)?;
        self.check(FailPoint::WriteHeader)?;
        header.write_to(&mut self.image)
    }

    fn write_data(&mut self, geometry: &Geometry, ram: &mut dyn DeviceRam) -> StorageResult<()> {
        self.require(Mode::Write)?;
        self.check(FailPoint::WriteData)?;
        store_payload(&mut self.image, geometry, ram)
    }

    fn close(&mut self) -> StorageResult<()> {
        let mode = self.mode.take().ok_or(StorageError::NotOpen)?;
        self.closes += 1;
        match mode {
            Mode::Read => self.check(FailPoint::CloseRead),
            Mode::Write => self.check(FailPoint::CloseWrite),
        }
    }

    fn image_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_store_has_no_media() {
        let mut store = MemoryImageStore::empty();
        assert!(!store.media_present());
        assert!(matches!(store.mount(), Err(StorageError::NoMedia)));
    }

    #[test]
    fn test_injected_failure() {
        let mut store = MemoryImageStore::with_image("a.dsk", &ImageHeader::default(), &[]);
        store.fail_at(FailPoint::OpenRead);
        store.mount().unwrap();
        assert!(store.open_read().is_err());
        assert!(!store.is_open());

        store.clear_failure();
        store.open_read().unwrap();
        assert_eq!(store.read_header().unwrap(), ImageHeader::default());
    }

    #[test]
    fn test_failed_close_still_releases() {
        let mut store = MemoryImageStore::with_image("a.dsk", &ImageHeader::default(), &[]);
        store.fail_at(FailPoint::CloseRead);
        store.mount().unwrap();
        store.open_read().unwrap();
        assert!(store.close().is_err());
        assert!(!store.is_open());
        assert_eq!(store.closes(), 1);
    }
}
