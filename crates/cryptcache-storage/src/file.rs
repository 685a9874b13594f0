//! Backing file abstraction.
//!
//! The directory only needs positioned reads and writes, the current size,
//! and a way to discard the contents before a rebuild. Real caches use
//! [`std::fs::File`]; tests and tooling can use an in-memory
//! `Cursor<Vec<u8>>`.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

/// A seekable read-write byte store holding one cache file.
pub trait CacheFile: Read + Write + Seek {
    /// Current size in bytes.
    fn size(&mut self) -> io::Result<u64>;

    /// Discard all contents and rewind to offset 0.
    fn truncate(&mut self) -> io::Result<()>;

    /// Read exactly `buf.len()` bytes at `offset`.
    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.read_exact(buf)
    }

    /// Write all of `data` at `offset`.
    fn write_all_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.write_all(data)
    }
}

impl CacheFile for File {
    fn size(&mut self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self) -> io::Result<()> {
        self.set_len(0)?;
        self.rewind()
    }
}

impl CacheFile for Cursor<Vec<u8>> {
    fn size(&mut self) -> io::Result<u64> {
        Ok(self.get_ref().len() as u64)
    }

    fn truncate(&mut self) -> io::Result<()> {
        self.get_mut().clear();
        self.set_position(0);
        Ok(())
    }
}
