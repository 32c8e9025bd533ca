//! CRC-8 checksum (polynomial 0x07, init 0x00, MSB first, no reflection, no final XOR)

/// Generator polynomial x^8 + x^2 + x + 1
pub const CRC8_POLY: u8 = 0x07;

/// Computes the CRC-8 of `data`
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = Crc8::new();
    crc.update(data);
    crc.finish()
}

/// Incremental CRC-8 digest. Feeding bytes in several calls yields the same
/// value as a single `crc8` over the concatenation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc8 {
    state: u8,
}

impl Crc8 {
    pub fn new() -> Self {
        Self { state: 0 }
    }

    pub fn update_byte(&mut self, byte: u8) {
        let mut crc = self.state ^ byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ CRC8_POLY
            } else {
                crc << 1
            };
        }
        self.state = crc;
    }

    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.update_byte(byte);
        }
    }

    pub fn finish(&self) -> u8 {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc8_known_vector() {
        // CRC-8/SMBUS check value
        assert_eq!(crc8(b"123456789"), 0xF4);
    }

    #[test]
    fn test_crc8_empty_and_zero() {
        assert_eq!(crc8(&[]), 0);
        assert_eq!(crc8(&[0x00]), 0);
        assert_eq!(crc8(&[0x01]), CRC8_POLY);
    }

    #[test]
    fn test_crc8_is_deterministic() {
        let data: Vec<u8> = (0..=255).collect();
        let first = crc8(&data);
        for _ in 0..10 {
            assert_eq!(crc8(&data), first);
        }
    }

    #[test]
    fn test_crc8_is_order_sensitive() {
        let a = [0x01u8];
        let b = [0x02u8];
        let ab = crc8(&[a[0], b[0]]);
        let ba = crc8(&[b[0], a[0]]);
        assert_ne!(ab, ba);
    }

    #[test]
    fn test_incremental_matches_oneshot() {
        let data = [0x03u8, 0x0A, 0x14, 0x1E];
        let mut digest = Crc8::new();
        digest.update_byte(data[0]);
        digest.update(&data[1..]);
        assert_eq!(digest.finish(), crc8(&data));
    }

    #[test]
    fn test_detects_every_single_bit_error() {
        let data = [0x03u8, 0x0A, 0x14, 0x1E];
        let good = crc8(&data);
        for i in 0..data.len() {
            for bit in 0..8 {
                let mut corrupted = data;
                corrupted[i] ^= 1 << bit;
                assert_ne!(crc8(&corrupted), good, "flip at byte {} bit {}", i, bit);
            }
        }
    }
}
