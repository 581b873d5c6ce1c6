//! Image store backed by a host directory.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::image::{load_payload, store_payload, ImageHeader};
use super::{ImageStore, StorageError, StorageResult};
use crate::hardware::DeviceRam;
use crate::state::Geometry;

enum Handle {
    Read(BufReader<File>),
    Write(BufWriter<File>),
}

/// Images stored as files in a directory standing in for the flash media.
///
/// The directory existing counts as media being present.
pub struct FileImageStore {
    root: PathBuf,
    file_name: String,
    mounted: bool,
    handle: Option<Handle>,
}

impl FileImageStore {
    pub fn new(root: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            file_name: file_name.into(),
            mounted: false,
            handle: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of the image file.
    pub fn path(&self) -> PathBuf {
        self.root.join(&self.file_name)
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    fn require_mounted(&self) -> StorageResult<()> {
        if self.mounted {
            Ok(())
        } else {
            Err(StorageError::NotMounted)
        }
    }

    fn reader(&mut self) -> StorageResult<&mut BufReader<File>> {
        match self.handle.as_mut() {
            Some(Handle::Read(reader)) => Ok(reader),
            _ => Err(StorageError::NotOpen),
        }
    }

    fn writer(&mut self) -> StorageResult<&mut BufWriter<File>> {
        match self.handle.as_mut() {
            Some(Handle::Write(writer)) => Ok(writer),
            _ => Err(StorageError::NotOpen),
        }
    }
}

impl ImageStore for FileImageStore {
    fn media_present(&mut self) -> bool {
        self.root.is_dir()
    }

    fn mount(&mut self) -> StorageResult<()> {
        if !self.media_present() {
            return Err(StorageError::NoMedia);
        }
        fs::read_dir(&self.root)
            .map_err(|e| StorageError::Mount(format!("{}: {}", self.root.display(), e)))?;
        self.mounted = true;
        debug!(root = %self.root.display(), "media mounted");
        Ok(())
    }

    fn open_read(&mut self) -> StorageResult<()> {
        self.require_mounted()?;
        let file = File::open(self.path())?;
        self.handle = Some(Handle::Read(BufReader::new(file)));
        debug!(path = %self.path().display(), "image opened for read");
        Ok(())
    }

    fn read_header(&mut self) -> StorageResult<ImageHeader> {
        ImageHeader::read_from(self.reader()?)
    }

    fn read_data(&mut self, geometry: &Geometry, ram: &mut dyn DeviceRam) -> StorageResult<()> {
        load_payload(self.reader()?, geometry, ram)
    }

    fn open_write(&mut self) -> StorageResult<()> {
        self.require_mounted()?;
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.path())?;
        self.handle = Some(Handle::Write(BufWriter::new(file)));
        debug!(path = %self.path().display(), "image opened for write");
        Ok(())
    }

    fn write_header(&mut self, header: &ImageHeader) -> StorageResult<()> {
        header.write_to(self.writer()?)
    }

    fn write_data(&mut self, geometry: &Geometry, ram: &mut dyn DeviceRam) -> StorageResult<()> {
        store_payload(self.writer()?, geometry, ram)
    }

    fn close(&mut self) -> StorageResult<()> {
        match self.handle.take() {
            Some(Handle::Read(_)) => {}
            Some(Handle::Write(mut writer)) => {
                writer.flush()?;
                writer.get_ref().sync_all()?;
            }
            None => return Err(StorageError::NotOpen),
        }
        debug!(path = %self.path().display(), "image closed");
        Ok(())
    }

    fn image_name(&self) -> &str {
        &self.file_name
    }
}
