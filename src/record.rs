//! Byte-level view of the caller's record type
//!
//! The entry manager never inspects payload semantics; it only needs a
//! fixed-size little-endian byte image of the record to checksum and to move
//! to and from the device. `Record` is that contract.

/// A fixed-size value that can be persisted as an entry payload.
///
/// `SIZE` is the exact on-media payload length in bytes; `encode` and
/// `decode` must fill and consume exactly `SIZE` bytes. `Default` supplies
/// the firmware-default values used by [`EntryManager::reset_to_default`].
///
/// [`EntryManager::reset_to_default`]: crate::EntryManager::reset_to_default
pub trait Record: Default {
    /// Payload length in bytes. Must be at least 1.
    const SIZE: usize;

    /// Write the record's byte image into `buf` (`buf.len() == SIZE`).
    fn encode(&self, buf: &mut [u8]);

    /// Overwrite the record from a byte image (`buf.len() == SIZE`).
    fn decode(&mut self, buf: &[u8]);
}

macro_rules! impl_record_for_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Record for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn encode(&self, buf: &mut [u8]) {
                    buf.copy_from_slice(&self.to_le_bytes());
                }

                fn decode(&mut self, buf: &[u8]) {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(buf);
                    *self = <$ty>::from_le_bytes(raw);
                }
            }
        )*
    };
}

impl_record_for_int!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128);

// Default for arrays is only provided by std for N <= 32, and the trait
// needs it for reset-to-default.
impl<const N: usize> Record for [u8; N]
where
    [u8; N]: Default,
{
    const SIZE: usize = N;

    fn encode(&self, buf: &mut [u8]) {
        buf.copy_from_slice(self);
    }

    fn decode(&mut self, buf: &[u8]) {
        self.copy_from_slice(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_round_trip() {
        let value: u32 = 0xDEAD_BEEF;
        let mut buf = [0u8; 4];
        value.encode(&mut buf);
        assert_eq!(buf, 0xDEAD_BEEFu32.to_le_bytes());

        let mut decoded = u32::default();
        decoded.decode(&buf);
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_signed_round_trip() {
        let value: i64 = -42;
        let mut buf = [0u8; 8];
        value.encode(&mut buf);

        let mut decoded = i64::default();
        decoded.decode(&buf);
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_byte_array_round_trip() {
        let value = [1u8, 2, 3, 4, 5];
        let mut buf = [0u8; 5];
        value.encode(&mut buf);
        assert_eq!(buf, value);

        let mut decoded = [0u8; 5];
        decoded.decode(&buf);
        assert_eq!(decoded, value);
    }

    // A caller-defined settings struct, the way firmware would use this.
    #[derive(Debug, PartialEq)]
    struct Settings {
        brightness: u8,
        volume: u8,
        boot_count: u32,
    }

    impl Default for Settings {
        fn default() -> Self {
            Settings {
                brightness: 128,
                volume: 10,
                boot_count: 0,
            }
        }
    }

    impl Record for Settings {
        const SIZE: usize = 6;

        fn encode(&self, buf: &mut [u8]) {
            buf[0] = self.brightness;
            buf[1] = self.volume;
            buf[2..6].copy_from_slice(&self.boot_count.to_le_bytes());
        }

        fn decode(&mut self, buf: &[u8]) {
            self.brightness = buf[0];
            self.volume = buf[1];
            self.boot_count = u32::from_le_bytes([buf[2], buf[3], buf[4], buf[5]]);
        }
    }

    #[test]
    fn test_struct_round_trip() {
        let settings = Settings {
            brightness: 200,
            volume: 3,
            boot_count: 99,
        };

        let mut buf = [0u8; Settings::SIZE];
        settings.encode(&mut buf);

        let mut decoded = Settings::default();
        decoded.decode(&buf);
        assert_eq!(decoded, settings);
    }
}
