//! Synchronous block device abstraction.
//!
//! The filesystem never assumes an async runtime or a particular transport;
//! it only needs fixed-size sector reads. [`FileBlockDevice`] implements
//! that over anything that is `Read + Seek`, which is enough to exercise the
//! whole crate against a plain disk image file or an in-memory `Cursor`.

use std::io::{Read, Seek, SeekFrom};

use crate::error::Result;

pub const SECTOR_SIZE: u32 = 512;

pub trait BlockDevice {
    /// Read `out.len()` bytes starting `byte_offset_in_sector` bytes into
    /// `sector` (512-byte units). `byte_offset_in_sector + out.len()` may
    /// span multiple sectors.
    fn read_at(&mut self, sector: u32, byte_offset_in_sector: u32, out: &mut [u8]) -> Result<()>;
}

pub struct FileBlockDevice<R> {
    inner: R,
}

impl<R> FileBlockDevice<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read + Seek> BlockDevice for FileBlockDevice<R> {
    fn read_at(&mut self, sector: u32, byte_offset_in_sector: u32, out: &mut [u8]) -> Result<()> {
        let pos = sector as u64 * SECTOR_SIZE as u64 + byte_offset_in_sector as u64;
        self.inner.seek(SeekFrom::Start(pos))?;
        self.inner.read_exact(out)?;
        Ok(())
    }
}

impl<R: Read + Seek> FileBlockDevice<R> {
    /// Read `out.len()` bytes at an absolute byte position, for callers that
    /// already have a fully-resolved physical sector address.
    pub fn read_bytes(&mut self, sector: u32, out: &mut [u8]) -> Result<()> {
        self.read_at(sector, 0, out)
    }
}
