//! Hexadecimal codec used by RN52 register commands and replies.
//!
//! The module speaks uppercase hex only. Register words go out as exactly
//! four digits (`S%,0021`), and replies are decoded digit by digit as they
//! trickle in from the serial line.

/// Hex digits lookup table for fast conversion.
const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Padding thresholds: every threshold the value falls below adds one zero.
const PAD_THRESHOLDS: [u16; 3] = [0x1000, 0x100, 0x10];

/// Encode a u16 as 4 uppercase hex digits.
///
/// The value is printed with its significant digits only and left-padded
/// with one `0` per threshold (4096, 256, 16) it falls below.
///
/// # Example
///
/// ```
/// use rn52_proto::hex::encode_hex_u16;
///
/// assert_eq!(&encode_hex_u16(0x21), b"0021");
/// assert_eq!(&encode_hex_u16(0xBEEF), b"BEEF");
/// ```
#[must_use]
pub fn encode_hex_u16(value: u16) -> [u8; 4] {
    let mut out = [b'0'; 4];
    let mut pos = PAD_THRESHOLDS.iter().filter(|&&t| value < t).count();

    let significant = 4 - pos;
    for i in (0..significant).rev() {
        out[pos] = HEX_DIGITS[((value >> (4 * i)) & 0xF) as usize];
        pos += 1;
    }
    out
}

/// Write a u8 as 2 uppercase hex digits.
///
/// Returns the number of bytes written (always 2).
///
/// # Panics
///
/// Panics if `buf.len() < 2`.
#[inline]
pub fn write_hex_u8(buf: &mut [u8], value: u8) -> usize {
    debug_assert!(buf.len() >= 2, "buffer too small for hex u8");
    buf[0] = HEX_DIGITS[(value >> 4) as usize];
    buf[1] = HEX_DIGITS[(value & 0xF) as usize];
    2
}

/// Convert an uppercase hex character to its value.
///
/// Lowercase digits are rejected: the module never emits them.
#[inline]
#[must_use]
pub const fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decode a complete hex string.
///
/// Returns `None` for an empty input or any non-hex character. Inputs longer
/// than four digits wrap at 16 bits, matching [`HexAccumulator`].
#[must_use]
pub fn decode_hex_u16(s: &[u8]) -> Option<u16> {
    if s.is_empty() {
        return None;
    }
    let mut acc = HexAccumulator::new();
    for &b in s {
        if !acc.push(b) {
            return None;
        }
    }
    Some(acc.value())
}

/// Incremental hex decoder fed one reply byte at a time.
///
/// `value = value * 16 + digit`, left to right.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HexAccumulator {
    value: u16,
    digits: u8,
}

impl HexAccumulator {
    /// Start an empty accumulator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            value: 0,
            digits: 0,
        }
    }

    /// Feed one byte. Returns `true` if it was a hex digit and got folded in.
    #[inline]
    pub fn push(&mut self, b: u8) -> bool {
        match hex_digit(b) {
            Some(d) => {
                self.value = self.value.wrapping_mul(16).wrapping_add(u16::from(d));
                self.digits = self.digits.saturating_add(1);
                true
            }
            None => false,
        }
    }

    /// Current value.
    #[inline]
    #[must_use]
    pub const fn value(&self) -> u16 {
        self.value
    }

    /// Number of digits folded in so far.
    #[inline]
    #[must_use]
    pub const fn digits(&self) -> u8 {
        self.digits
    }

    /// Drop everything accumulated so far.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_pads_by_threshold() {
        assert_eq!(&encode_hex_u16(0x0000), b"0000");
        assert_eq!(&encode_hex_u16(0x000F), b"000F");
        assert_eq!(&encode_hex_u16(0x0010), b"0010");
        assert_eq!(&encode_hex_u16(0x00FF), b"00FF");
        assert_eq!(&encode_hex_u16(0x0100), b"0100");
        assert_eq!(&encode_hex_u16(0x0FFF), b"0FFF");
        assert_eq!(&encode_hex_u16(0x1000), b"1000");
        assert_eq!(&encode_hex_u16(0xFFFF), b"FFFF");
    }

    #[test]
    fn test_round_trip_at_thresholds() {
        for value in [0u16, 15, 16, 255, 256, 4095, 4096, 65535] {
            assert_eq!(decode_hex_u16(&encode_hex_u16(value)), Some(value));
        }
    }

    #[test]
    fn test_write_hex_u8() {
        let mut buf = [0u8; 2];

        write_hex_u8(&mut buf, 0x0B);
        assert_eq!(&buf, b"0B");

        write_hex_u8(&mut buf, 0xFF);
        assert_eq!(&buf, b"FF");
    }

    #[test]
    fn test_decode_is_case_sensitive() {
        assert_eq!(decode_hex_u16(b"00FF"), Some(0xFF));
        assert_eq!(decode_hex_u16(b"00ff"), None);
        assert_eq!(decode_hex_u16(b""), None);
        assert_eq!(decode_hex_u16(b"12G4"), None);
    }

    #[test]
    fn test_accumulator_skips_non_digits() {
        let mut acc = HexAccumulator::new();
        for &b in b"0x2\n1" {
            acc.push(b);
        }
        // 'x' and '\n' are not digits; the rest reads as 0x021
        assert_eq!(acc.value(), 0x021);
        assert_eq!(acc.digits(), 3);

        acc.reset();
        assert_eq!(acc.value(), 0);
    }

    #[test]
    fn test_accumulator_wraps_past_four_digits() {
        let mut acc = HexAccumulator::new();
        for &b in b"1FFFF" {
            acc.push(b);
        }
        assert_eq!(acc.value(), 0xFFFF);
    }
}
