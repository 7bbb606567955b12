//! # nvcell - Wear-Leveled Single-Record NVM Persistence
//!
//! `nvcell` persists one fixed-size, typed record inside a finite,
//! wear-limited byte-addressable non-volatile memory region (EEPROM-class).
//! It detects whether the in-memory record changed since the last persisted
//! write, and only then writes - while bounding physical writes to any one
//! address and detecting corruption via checksums:
//!
//! - **Change detection**: a 32-bit payload checksum gates every write; the
//!   common case performs zero device writes
//! - **Wear leveling**: each slot takes a bounded number of rewrites, then
//!   the entry relocates to the next free slot
//! - **Corruption detection**: an 8-bit key checksum separates genuine entry
//!   headers from erased or corrupt bytes
//!
//! ## Quick Start
//!
//! ```rust
//! use nvcell::{EntryManager, MemNvm, Result, UpdateOutcome};
//!
//! # fn main() -> Result<()> {
//! let mut settings: u32 = 10;
//! let mut manager = EntryManager::new(MemNvm::new(4096), &mut settings)?;
//!
//! // Nothing changed: no device write
//! assert_eq!(manager.update(), UpdateOutcome::Unchanged);
//!
//! // Mutate, then persist
//! *manager.record_mut() = 20;
//! assert_eq!(manager.update(), UpdateOutcome::Written(2));
//! # Ok(())
//! # }
//! ```
//!
//! ## Region layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            NVM region (erased: 0xFF)         │
//! ├──────────────────────────────────────────────┤
//! │ Entry at address A                           │
//! │  - key (2B), key_checksum (1B)               │
//! │  - write_count (4B), length (2B)             │
//! │  - payload (length bytes)                    │
//! │  - payload_checksum (4B)                     │
//! ├──────────────────────────────────────────────┤
//! │ Entry at A + length + 13                     │
//! │  - retired slots (count at ceiling) and      │
//! │    other keys' entries, skipped by length    │
//! ├──────────────────────────────────────────────┤
//! │ Erased space: first free slot for relocation │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! A manager instance owns one candidate address. The locator scans forward
//! from it, skipping structurally valid entries by their recorded length,
//! and halts at the first slot whose key checksum does not validate (erased
//! and corrupt bytes are indistinguishable - see
//! [`EntryManager::update`] and the locator notes in [`manager`]).
//!
//! Devices plug in through the [`Nvm`] trait; [`MemNvm`] backs hosts and
//! tests, [`FileNvm`] emulates an EEPROM in a host file.

pub mod checksum;
pub mod entry;
pub mod error;
pub mod manager;
pub mod nvm;
pub mod record;

// Re-export commonly used types
pub use checksum::{checksum32, checksum8};
pub use entry::{EntryHeader, ENTRY_OVERHEAD};
pub use error::{NvcellError, Result};
pub use manager::{
    EntryConfig, EntryManager, UpdateOutcome, DEFAULT_KEY, DEFAULT_MAX_WRITES, EXHAUSTED_SENTINEL,
};
pub use nvm::{FileNvm, MemNvm, Nvm, ERASED_BYTE, ESP_FLASH_CAPACITY, RP2040_FLASH_CAPACITY};
pub use record::Record;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
