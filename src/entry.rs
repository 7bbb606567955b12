//! On-media entry layout and codec
//!
//! An entry is a header, the opaque payload, and a checksum trailer, packed
//! little-endian at a byte offset within the region:
//!
//! ```text
//! offset 0          key               (2 bytes)
//! offset 2          key_checksum      (1 byte)
//! offset 3          write_count       (4 bytes)
//! offset 7          length            (2 bytes)
//! offset 9          payload           (length bytes)
//! offset 9+length   payload_checksum  (4 bytes)
//! ```
//!
//! The locator's slot-skip arithmetic depends on these widths summing to
//! exactly [`ENTRY_OVERHEAD`]; the layout is load-bearing and must not change.

use crate::checksum::checksum8;
use crate::nvm::Nvm;

pub const KEY_OFFSET: usize = 0;
pub const KEY_CHECKSUM_OFFSET: usize = 2;
pub const WRITE_COUNT_OFFSET: usize = 3;
pub const LENGTH_OFFSET: usize = 7;
pub const PAYLOAD_OFFSET: usize = 9;
pub const TRAILER_LEN: usize = 4;

/// Fixed per-entry overhead: header (9 bytes) + payload checksum trailer (4).
pub const ENTRY_OVERHEAD: usize = PAYLOAD_OFFSET + TRAILER_LEN;

/// Total on-media size of an entry with a `length`-byte payload.
pub fn entry_size(length: usize) -> usize {
    ENTRY_OVERHEAD + length
}

/// In-memory image of an entry's header and trailer fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    pub key: u16,
    pub key_checksum: u8,
    pub write_count: u32,
    pub length: u16,
    pub payload_checksum: u32,
}

impl EntryHeader {
    /// Fresh header for `key` with a `length`-byte payload whose checksum is
    /// already computed. Write count starts at 1.
    pub fn new(key: u16, length: u16, payload_checksum: u32) -> Self {
        EntryHeader {
            key,
            key_checksum: checksum8(&key.to_le_bytes()),
            write_count: 1,
            length,
            payload_checksum,
        }
    }

    /// Total on-media size of this entry.
    pub fn entry_size(&self) -> usize {
        entry_size(self.length as usize)
    }

    /// Encode the full entry (header, payload, trailer) at `address`.
    pub fn encode_full<D: Nvm>(&self, nvm: &mut D, address: usize, payload: &[u8]) {
        nvm.put_u16(address + KEY_OFFSET, self.key);
        nvm.put(address + KEY_CHECKSUM_OFFSET, self.key_checksum);
        nvm.put_u32(address + WRITE_COUNT_OFFSET, self.write_count);
        nvm.put_u16(address + LENGTH_OFFSET, self.length);
        nvm.put_bytes(address + PAYLOAD_OFFSET, payload);
        nvm.put_u32(
            address + PAYLOAD_OFFSET + payload.len(),
            self.payload_checksum,
        );
    }

    /// Encode only the fields an in-place update touches: write_count,
    /// payload, payload_checksum. Key, key_checksum and length are fixed for
    /// the life of a slot.
    pub fn encode_update<D: Nvm>(&self, nvm: &mut D, address: usize, payload: &[u8]) {
        nvm.put_u32(address + WRITE_COUNT_OFFSET, self.write_count);
        nvm.put_bytes(address + PAYLOAD_OFFSET, payload);
        nvm.put_u32(
            address + PAYLOAD_OFFSET + payload.len(),
            self.payload_checksum,
        );
    }

    /// Decode write_count, payload and payload_checksum from the entry at
    /// `address` (key, key_checksum and length were already validated by the
    /// locator and are not re-read).
    pub fn decode_payload<D: Nvm>(&mut self, nvm: &D, address: usize, payload: &mut [u8]) {
        self.write_count = nvm.get_u32(address + WRITE_COUNT_OFFSET);
        nvm.get_bytes(address + PAYLOAD_OFFSET, payload);
        self.payload_checksum = nvm.get_u32(address + PAYLOAD_OFFSET + payload.len());
    }
}

/// Header fields of a structurally valid slot, as seen by the locator.
#[derive(Debug, Clone, Copy)]
pub struct SlotProbe {
    pub key: u16,
    pub write_count: u32,
    pub length: u16,
}

/// Probe `address` for a structurally valid entry header.
///
/// Returns `None` when the stored key checksum does not match the stored key
/// (erased or corrupt bytes; the two are indistinguishable) or when the
/// region cannot hold a header at `address`.
pub fn probe<D: Nvm>(nvm: &D, address: usize) -> Option<SlotProbe> {
    if address + PAYLOAD_OFFSET > nvm.capacity() {
        return None;
    }

    let key = nvm.get_u16(address + KEY_OFFSET);
    let stored = nvm.get(address + KEY_CHECKSUM_OFFSET);
    if checksum8(&key.to_le_bytes()) != stored {
        return None;
    }

    Some(SlotProbe {
        key,
        write_count: nvm.get_u32(address + WRITE_COUNT_OFFSET),
        length: nvm.get_u16(address + LENGTH_OFFSET),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::checksum32;
    use crate::nvm::MemNvm;

    #[test]
    fn test_layout_overhead() {
        assert_eq!(ENTRY_OVERHEAD, 13);
        assert_eq!(entry_size(4), 17);
    }

    #[test]
    fn test_encode_full_field_layout() {
        let mut nvm = MemNvm::new(64);
        let payload = [0x0A, 0x00, 0x00, 0x00];
        let header = EntryHeader::new(0x0001, 4, checksum32(&payload));
        header.encode_full(&mut nvm, 0, &payload);

        assert_eq!(nvm.get_u16(KEY_OFFSET), 0x0001);
        assert_eq!(
            nvm.get(KEY_CHECKSUM_OFFSET),
            checksum8(&0x0001u16.to_le_bytes())
        );
        assert_eq!(nvm.get_u32(WRITE_COUNT_OFFSET), 1);
        assert_eq!(nvm.get_u16(LENGTH_OFFSET), 4);
        assert_eq!(&nvm.as_bytes()[PAYLOAD_OFFSET..PAYLOAD_OFFSET + 4], &payload);
        assert_eq!(nvm.get_u32(PAYLOAD_OFFSET + 4), checksum32(&payload));
    }

    #[test]
    fn test_round_trip() {
        let mut nvm = MemNvm::new(64);
        let payload = [9u8, 8, 7, 6, 5];
        let mut header = EntryHeader::new(0x00AB, 5, checksum32(&payload));
        header.write_count = 17;
        header.encode_full(&mut nvm, 3, &payload);

        let mut decoded = EntryHeader::new(0x00AB, 5, 0);
        let mut out = [0u8; 5];
        decoded.decode_payload(&nvm, 3, &mut out);

        assert_eq!(out, payload);
        assert_eq!(decoded.write_count, 17);
        assert_eq!(decoded.payload_checksum, checksum32(&payload));
    }

    #[test]
    fn test_probe_valid_entry() {
        let mut nvm = MemNvm::new(64);
        let payload = [1u8, 2, 3, 4];
        let header = EntryHeader::new(0x0007, 4, checksum32(&payload));
        header.encode_full(&mut nvm, 0, &payload);

        let slot = probe(&nvm, 0).expect("entry should probe as valid");
        assert_eq!(slot.key, 0x0007);
        assert_eq!(slot.write_count, 1);
        assert_eq!(slot.length, 4);
    }

    #[test]
    fn test_probe_erased_region() {
        let nvm = MemNvm::new(64);
        assert!(probe(&nvm, 0).is_none());
    }

    #[test]
    fn test_probe_corrupt_checksum() {
        let mut nvm = MemNvm::new(64);
        let payload = [1u8, 2, 3, 4];
        let header = EntryHeader::new(0x0007, 4, checksum32(&payload));
        header.encode_full(&mut nvm, 0, &payload);

        nvm.as_bytes_mut()[KEY_CHECKSUM_OFFSET] ^= 0xFF;
        assert!(probe(&nvm, 0).is_none());
    }

    #[test]
    fn test_probe_past_region_end() {
        let nvm = MemNvm::new(16);
        assert!(probe(&nvm, 10).is_none());
        assert!(probe(&nvm, 16).is_none());
    }

    #[test]
    fn test_encode_update_leaves_header_prefix() {
        let mut nvm = MemNvm::new(64);
        let payload = [1u8, 2, 3, 4];
        let mut header = EntryHeader::new(0x0001, 4, checksum32(&payload));
        header.encode_full(&mut nvm, 0, &payload);

        let updated = [4u8, 3, 2, 1];
        header.write_count = 2;
        header.payload_checksum = checksum32(&updated);
        header.encode_update(&mut nvm, 0, &updated);

        // Key, key checksum and length untouched
        assert_eq!(nvm.get_u16(KEY_OFFSET), 0x0001);
        assert_eq!(nvm.get_u16(LENGTH_OFFSET), 4);
        assert_eq!(nvm.get_u32(WRITE_COUNT_OFFSET), 2);
        assert_eq!(&nvm.as_bytes()[PAYLOAD_OFFSET..PAYLOAD_OFFSET + 4], &updated);
    }
}
