//! NVM device abstraction and backends
//!
//! The entry manager treats non-volatile memory as an addressable byte array
//! with get/put/commit primitives. `Nvm` is that contract; `MemNvm` is a
//! heap-backed region for hosts and tests, `FileNvm` persists the region to a
//! file so host tooling can emulate an EEPROM across process restarts.

use crate::error::Result;
use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Byte value of unwritten/erased NVM.
pub const ERASED_BYTE: u8 = 0xFF;

/// Default region capacity for RP2040-class flash-backed EEPROM emulation.
pub const RP2040_FLASH_CAPACITY: usize = 4096;

/// Default region capacity for ESP-class flash-backed EEPROM emulation.
pub const ESP_FLASH_CAPACITY: usize = 512;

/// Byte-addressable non-volatile memory region.
///
/// Reads and writes are synchronous and assumed to succeed; whether `put`
/// diffs against the current contents (update semantics) or writes
/// unconditionally is the backend's choice. Backends that buffer writes
/// flush them in `commit`; backends that need a capacity-bound setup step
/// do it in `begin`. Both default to no-ops.
pub trait Nvm {
    /// Total addressable length of the region.
    fn capacity(&self) -> usize;

    /// Read one byte.
    fn get(&self, address: usize) -> u8;

    /// Read `buf.len()` bytes starting at `address`.
    fn get_bytes(&self, address: usize, buf: &mut [u8]) {
        for (i, slot) in buf.iter_mut().enumerate() {
            *slot = self.get(address + i);
        }
    }

    /// Write one byte.
    fn put(&mut self, address: usize, value: u8);

    /// Write `bytes` starting at `address`.
    fn put_bytes(&mut self, address: usize, bytes: &[u8]) {
        for (i, &byte) in bytes.iter().enumerate() {
            self.put(address + i, byte);
        }
    }

    /// Read a little-endian u16.
    fn get_u16(&self, address: usize) -> u16 {
        let mut raw = [0u8; 2];
        self.get_bytes(address, &mut raw);
        u16::from_le_bytes(raw)
    }

    /// Read a little-endian u32.
    fn get_u32(&self, address: usize) -> u32 {
        let mut raw = [0u8; 4];
        self.get_bytes(address, &mut raw);
        u32::from_le_bytes(raw)
    }

    /// Write a little-endian u16.
    fn put_u16(&mut self, address: usize, value: u16) {
        self.put_bytes(address, &value.to_le_bytes());
    }

    /// Write a little-endian u32.
    fn put_u32(&mut self, address: usize, value: u32) {
        self.put_bytes(address, &value.to_le_bytes());
    }

    /// Capacity-bound initialization for backends that need it (flash-backed
    /// EEPROM emulations). No-op by default.
    fn begin(&mut self, _capacity: usize) {}

    /// Flush pending writes. No-op for backends that write through.
    fn commit(&mut self) {}
}

/// Heap-backed NVM region.
///
/// Writes use update semantics (a byte is only touched when it differs), and
/// the device counts touched bytes and commits so tests can assert that
/// unchanged updates perform zero physical writes.
pub struct MemNvm {
    bytes: Vec<u8>,
    bytes_written: u64,
    commits: u64,
}

impl MemNvm {
    /// Create an erased region of `capacity` bytes (all `0xFF`).
    pub fn new(capacity: usize) -> Self {
        MemNvm {
            bytes: vec![ERASED_BYTE; capacity],
            bytes_written: 0,
            commits: 0,
        }
    }

    /// Total bytes physically changed since creation.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Number of commit calls since creation.
    pub fn commits(&self) -> u64 {
        self.commits
    }

    /// Raw view of the region, for inspection.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Raw mutable view of the region, for fault injection.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl Nvm for MemNvm {
    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn get(&self, address: usize) -> u8 {
        self.bytes[address]
    }

    fn put(&mut self, address: usize, value: u8) {
        if self.bytes[address] != value {
            self.bytes[address] = value;
            self.bytes_written += 1;
        }
    }

    fn commit(&mut self) {
        self.commits += 1;
    }
}

/// File-backed NVM region for host-side EEPROM emulation.
///
/// The region lives in memory and is persisted on `commit`. A commit failure
/// is logged and remembered rather than surfaced through the infallible
/// device contract; callers that need the error use [`FileNvm::sync`].
pub struct FileNvm {
    bytes: Vec<u8>,
    path: PathBuf,
    dirty: bool,
}

impl FileNvm {
    /// Open a file-backed region of `capacity` bytes.
    ///
    /// An existing file's contents seed the region (truncated or padded with
    /// the erased byte to `capacity`); a missing file starts erased.
    pub fn open<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut bytes = vec![ERASED_BYTE; capacity];

        match OpenOptions::new().read(true).open(&path) {
            Ok(mut file) => {
                let mut existing = Vec::new();
                file.read_to_end(&mut existing)?;
                let n = existing.len().min(capacity);
                bytes[..n].copy_from_slice(&existing[..n]);
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        Ok(FileNvm {
            bytes,
            path,
            dirty: false,
        })
    }

    /// Persist the region to the backing file.
    pub fn sync(&mut self) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;
        file.write_all(&self.bytes)?;
        file.flush()?;
        self.dirty = false;
        Ok(())
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Nvm for FileNvm {
    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn get(&self, address: usize) -> u8 {
        self.bytes[address]
    }

    fn put(&mut self, address: usize, value: u8) {
        if self.bytes[address] != value {
            self.bytes[address] = value;
            self.dirty = true;
        }
    }

    fn commit(&mut self) {
        if !self.dirty {
            return;
        }
        if let Err(err) = self.sync() {
            tracing::warn!("commit to {} failed: {}", self.path.display(), err);
        }
    }
}
