//! Entry manager: change detection, locate, and wear-leveled updates

use crate::checksum::checksum32;
use crate::entry::{self, EntryHeader, ENTRY_OVERHEAD};
use crate::error::{NvcellError, Result};
use crate::nvm::{Nvm, ERASED_BYTE};
use crate::record::Record;
use std::io::Write;

/// Key used when the caller does not supply one.
pub const DEFAULT_KEY: u16 = 0x0001;

/// Default per-slot write ceiling before relocation.
pub const DEFAULT_MAX_WRITES: u32 = 100_000;

/// Raw sentinel for the exhausted state in the numeric update protocol.
pub const EXHAUSTED_SENTINEL: u32 = u32::MAX;

/// Entry manager configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryConfig {
    /// Key identifying this manager's entry within the region.
    pub key: u16,
    /// Per-slot write ceiling; reaching it forces relocation.
    pub max_writes: u32,
}

impl Default for EntryConfig {
    fn default() -> Self {
        EntryConfig {
            key: DEFAULT_KEY,
            max_writes: DEFAULT_MAX_WRITES,
        }
    }
}

/// Result of an [`EntryManager::update`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Record checksum matched the stored entry; no device write occurred.
    Unchanged,
    /// Record persisted; carries the slot's write count after the write
    /// (1 when the entry was relocated to a fresh slot).
    Written(u32),
    /// No slot with enough room remains. Terminal for this key until the
    /// region is wiped; every later changed update reports it again.
    Exhausted,
}

impl UpdateOutcome {
    /// Numeric form of the outcome: 0 for unchanged, the write count for a
    /// write, [`EXHAUSTED_SENTINEL`] for exhaustion.
    pub fn raw(self) -> u32 {
        match self {
            UpdateOutcome::Unchanged => 0,
            UpdateOutcome::Written(count) => count,
            UpdateOutcome::Exhausted => EXHAUSTED_SENTINEL,
        }
    }

    pub fn is_exhausted(self) -> bool {
        matches!(self, UpdateOutcome::Exhausted)
    }
}

/// Manages persistence of one fixed-size record inside an NVM region.
///
/// The manager borrows the caller's record; the caller mutates it through
/// [`record_mut`](Self::record_mut) between [`update`](Self::update) calls
/// and the manager persists it only when its checksum changes. Each slot on
/// media takes at most `max_writes` physical rewrites before the entry is
/// relocated to the next free slot.
///
/// Multiple managers with distinct keys may share one region, but nothing
/// here prevents key collisions or overlapping writes between instances;
/// that is the caller's responsibility.
pub struct EntryManager<'a, T: Record, D: Nvm> {
    device: D,
    record: &'a mut T,
    header: EntryHeader,
    address: usize,
    max_writes: u32,
    scratch: Vec<u8>,
}

impl<'a, T: Record, D: Nvm> EntryManager<'a, T, D> {
    /// Construct a manager with [`DEFAULT_KEY`] and the default write
    /// ceiling, then locate or create the entry on media.
    pub fn new(device: D, record: &'a mut T) -> Result<Self> {
        Self::with_config(device, record, EntryConfig::default())
    }

    /// Construct a manager with a caller-supplied key.
    pub fn with_key(device: D, record: &'a mut T, key: u16) -> Result<Self> {
        Self::with_config(
            device,
            record,
            EntryConfig {
                key,
                ..EntryConfig::default()
            },
        )
    }

    /// Construct a manager with full configuration, then locate or create
    /// the entry on media.
    ///
    /// On a located entry the record is overwritten from media; otherwise a
    /// fresh entry holding the record's current values is written at the
    /// first free slot.
    pub fn with_config(device: D, record: &'a mut T, config: EntryConfig) -> Result<Self> {
        let capacity = device.capacity();
        if T::SIZE > u16::MAX as usize || entry::entry_size(T::SIZE) > capacity {
            return Err(NvcellError::RecordTooLarge {
                record: T::SIZE,
                overhead: ENTRY_OVERHEAD,
                capacity,
            });
        }

        let mut manager = EntryManager {
            device,
            record,
            header: EntryHeader::new(config.key, T::SIZE as u16, 0),
            address: 0,
            max_writes: config.max_writes,
            scratch: vec![0u8; T::SIZE],
        };
        manager.begin()?;
        Ok(manager)
    }

    /// Persist the record if it changed since the last persisted write.
    ///
    /// The common case is [`UpdateOutcome::Unchanged`]: the record's checksum
    /// matches the stored one and no device write happens. On change the
    /// entry is rewritten in place while the slot's write count stays below
    /// the ceiling; a slot at the ceiling is left untouched and the entry
    /// relocates to the next free slot with its count reset to 1.
    pub fn update(&mut self) -> UpdateOutcome {
        self.record.encode(&mut self.scratch);
        let crc = checksum32(&self.scratch);
        if crc == self.header.payload_checksum {
            return UpdateOutcome::Unchanged;
        }

        if self.header.write_count >= self.max_writes {
            return self.relocate(crc);
        }

        self.header.write_count += 1;
        self.header.payload_checksum = crc;
        self.header
            .encode_update(&mut self.device, self.address, &self.scratch);
        self.device.commit();
        UpdateOutcome::Written(self.header.write_count)
    }

    /// Re-run device initialization and the locate/read-or-write sequence.
    ///
    /// Calls the device's `begin` hook with the region capacity (a no-op on
    /// backends that need none) and restarts the scan at address 0. Intended
    /// for flash-backed EEPROM emulations whose setup cannot happen during
    /// construction.
    pub fn synchronize(&mut self) -> Result<()> {
        let capacity = self.device.capacity();
        self.device.begin(capacity);
        self.address = 0;
        self.begin()
    }

    /// Replace the record with its type-default values and persist them.
    pub fn reset_to_default(&mut self) {
        *self.record = T::default();
        self.force_write();
    }

    /// Persist the record unconditionally, bypassing change detection.
    ///
    /// Rewrites the full entry at the current slot without touching the
    /// write count. On an exhausted region there is no slot to write to;
    /// the call is a logged no-op until [`wipe_region`](Self::wipe_region).
    pub fn force_write(&mut self) {
        if self.address + self.header.entry_size() > self.device.capacity() {
            tracing::warn!(
                "forced write for key {:#06x} dropped: no slot at address {}",
                self.header.key,
                self.address
            );
            return;
        }
        self.record.encode(&mut self.scratch);
        self.header.payload_checksum = checksum32(&self.scratch);
        self.header
            .encode_full(&mut self.device, self.address, &self.scratch);
        self.device.commit();
    }

    /// Erase the whole region back to `0xFF` and write the entry fresh.
    ///
    /// The only recovery path from an exhausted region. Bytes already erased
    /// are not rewritten.
    pub fn wipe_region(&mut self) -> Result<()> {
        for address in 0..self.device.capacity() {
            if self.device.get(address) != ERASED_BYTE {
                self.device.put(address, ERASED_BYTE);
            }
        }
        self.device.commit();
        self.address = 0;
        self.begin()
    }

    /// Emit every region byte as hexadecimal text. Debug aid.
    pub fn dump<W: Write>(&self, sink: &mut W) -> Result<()> {
        for address in 0..self.device.capacity() {
            write!(sink, "{:02X} ", self.device.get(address))?;
        }
        writeln!(sink)?;
        Ok(())
    }

    /// The managed record.
    pub fn record(&self) -> &T {
        self.record
    }

    /// Mutable access to the managed record. Mutations are persisted by the
    /// next [`update`](Self::update) call.
    pub fn record_mut(&mut self) -> &mut T {
        self.record
    }

    /// This manager's entry key.
    pub fn key(&self) -> u16 {
        self.header.key
    }

    /// Current candidate address of the entry within the region.
    pub fn address(&self) -> usize {
        self.address
    }

    /// Write count of the current slot.
    pub fn write_count(&self) -> u32 {
        self.header.write_count
    }

    /// The underlying device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Mutable access to the underlying device.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Consume the manager, releasing the device.
    pub fn into_device(self) -> D {
        self.device
    }

    /// Initialize header fields from the bound record, then locate the entry
    /// and read it, or write it fresh at the first free slot.
    fn begin(&mut self) -> Result<()> {
        self.record.encode(&mut self.scratch);
        self.header = EntryHeader::new(
            self.header.key,
            T::SIZE as u16,
            checksum32(&self.scratch),
        );

        if self.locate() {
            tracing::debug!(
                "entry for key {:#06x} located at address {}",
                self.header.key,
                self.address
            );
            self.read_entry();
        } else {
            if self.address + self.header.entry_size() > self.device.capacity() {
                tracing::warn!(
                    "no room for a fresh entry for key {:#06x} at address {}",
                    self.header.key,
                    self.address
                );
                return Err(NvcellError::RegionExhausted);
            }
            self.write_entry();
        }
        Ok(())
    }

    /// Linear scan from the current candidate address for a structurally
    /// valid entry matching this key with a write count under the ceiling.
    ///
    /// A slot whose key checksum does not validate halts the scan: erased
    /// space and corrupt bytes are indistinguishable, and without a trusted
    /// length the next slot offset cannot be computed. A corrupt or
    /// foreign-format slot therefore blocks discovery of every entry behind
    /// it, including other keys' entries.
    fn locate(&mut self) -> bool {
        let capacity = self.device.capacity();
        while self.address < capacity {
            let Some(slot) = entry::probe(&self.device, self.address) else {
                return false;
            };
            if slot.key == self.header.key && slot.write_count < self.max_writes {
                return true;
            }
            // Foreign key, or this key's slot retired at the ceiling: skip
            // the whole entry using its recorded length.
            self.address += entry::entry_size(slot.length as usize);
        }
        false
    }

    /// Relocate the entry to the next free slot with its count reset to 1.
    /// The retired slot's bytes are left untouched.
    fn relocate(&mut self, crc: u32) -> UpdateOutcome {
        self.locate();
        if self.address + self.header.entry_size() > self.device.capacity() {
            tracing::warn!(
                "region exhausted for key {:#06x}: no slot fits {} bytes",
                self.header.key,
                self.header.entry_size()
            );
            return UpdateOutcome::Exhausted;
        }

        self.header.write_count = 1;
        self.header.payload_checksum = crc;
        self.header
            .encode_full(&mut self.device, self.address, &self.scratch);
        self.device.commit();
        tracing::info!(
            "entry for key {:#06x} relocated to address {}",
            self.header.key,
            self.address
        );
        UpdateOutcome::Written(1)
    }

    fn read_entry(&mut self) {
        self.header
            .decode_payload(&self.device, self.address, &mut self.scratch);
        self.record.decode(&self.scratch);
    }

    fn write_entry(&mut self) {
        self.header
            .encode_full(&mut self.device, self.address, &self.scratch);
        self.device.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nvm::MemNvm;

    #[test]
    fn test_construct_writes_fresh_entry() {
        let mut value: u32 = 10;
        let manager = EntryManager::new(MemNvm::new(64), &mut value).unwrap();
        assert_eq!(manager.address(), 0);
        assert_eq!(manager.write_count(), 1);
        assert_eq!(manager.device().commits(), 1);
    }

    #[test]
    fn test_construct_reads_existing_entry() {
        let mut device = MemNvm::new(64);
        {
            let mut value: u32 = 1234;
            let manager = EntryManager::new(device, &mut value).unwrap();
            device = manager.into_device();
        }

        let mut value: u32 = 0;
        let manager = EntryManager::new(device, &mut value).unwrap();
        assert_eq!(*manager.record(), 1234);
        assert_eq!(manager.write_count(), 1);
    }

    #[test]
    fn test_record_too_large() {
        // 8-byte payload + 13 bytes of overhead cannot fit in 16 bytes
        let mut value = [0u8; 8];
        let err = EntryManager::new(MemNvm::new(16), &mut value).err().unwrap();
        assert!(matches!(err, NvcellError::RecordTooLarge { .. }));
    }

    #[test]
    fn test_update_outcome_raw() {
        assert_eq!(UpdateOutcome::Unchanged.raw(), 0);
        assert_eq!(UpdateOutcome::Written(7).raw(), 7);
        assert_eq!(UpdateOutcome::Exhausted.raw(), EXHAUSTED_SENTINEL);
        assert!(UpdateOutcome::Exhausted.is_exhausted());
    }

    #[test]
    fn test_force_write_persists_without_count_change() {
        let mut value: u32 = 5;
        let mut manager = EntryManager::new(MemNvm::new(64), &mut value).unwrap();

        *manager.record_mut() = 6;
        manager.force_write();
        assert_eq!(manager.write_count(), 1);

        // Entry on media is self-consistent: a later update sees no change
        assert_eq!(manager.update(), UpdateOutcome::Unchanged);
    }

    #[test]
    fn test_reset_to_default() {
        let mut value: u32 = 42;
        let mut manager = EntryManager::new(MemNvm::new(64), &mut value).unwrap();

        manager.reset_to_default();
        assert_eq!(*manager.record(), 0);
        assert_eq!(manager.update(), UpdateOutcome::Unchanged);
    }

    #[test]
    fn test_dump_emits_hex() {
        let mut value: u8 = 0xAB;
        let manager = EntryManager::new(MemNvm::new(16), &mut value).unwrap();

        let mut out = Vec::new();
        manager.dump(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        // 16 bytes, two hex digits and a space each, newline-terminated
        assert_eq!(text.len(), 16 * 3 + 1);
        assert!(text.ends_with('\n'));
        assert!(text.starts_with("01 00 ")); // key 0x0001, little-endian
    }

    #[test]
    fn test_synchronize_rescans_from_zero() {
        let mut value: u32 = 77;
        let mut manager = EntryManager::new(MemNvm::new(64), &mut value).unwrap();

        *manager.record_mut() = 88;
        assert_eq!(manager.update(), UpdateOutcome::Written(2));

        manager.synchronize().unwrap();
        assert_eq!(manager.address(), 0);
        assert_eq!(*manager.record(), 88);
        assert_eq!(manager.write_count(), 2);
    }
}
