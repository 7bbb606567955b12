//! Checksum primitives for entry validation
//!
//! Two pure functions over byte spans: an 8-bit checksum guarding the entry
//! header (distinguishes a genuine header from erased or foreign bytes) and a
//! 32-bit checksum guarding the payload (change detection and corruption
//! detection).

/// CRC-8/SMBUS polynomial (x^8 + x^2 + x + 1).
const CRC8_POLY: u8 = 0x07;

/// 8-bit checksum over a byte span.
///
/// Used for the entry header's key checksum. Bitwise CRC-8/SMBUS: init 0x00,
/// no reflection, no final XOR.
pub fn checksum8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0x00;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            if crc & 0x80 != 0 {
                crc = (crc << 1) ^ CRC8_POLY;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// 32-bit checksum over a byte span.
///
/// Used for the payload trailer. Standard CRC-32 (IEEE).
pub fn checksum32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}
