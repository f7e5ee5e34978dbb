//! Turning raw register bytes into integers.
//!
//! Every function takes the whole buffer and the index of the first byte,
//! mirroring how the datasheets list calibration words by offset. An index
//! past the end of the buffer is a bug in the caller and panics.

/// `bytes[i]` is the low byte, `bytes[i + 1]` the high byte.
pub fn signed16_le(bytes: &[u8], i: usize) -> i16 {
    i16::from_le_bytes([bytes[i], bytes[i + 1]])
}

/// `bytes[i]` is the low byte, `bytes[i + 1]` the high byte.
pub fn unsigned16_le(bytes: &[u8], i: usize) -> u16 {
    u16::from_le_bytes([bytes[i], bytes[i + 1]])
}

/// `bytes[i]` is the high byte, `bytes[i + 1]` the low byte.
pub fn unsigned16_be(bytes: &[u8], i: usize) -> u16 {
    u16::from_be_bytes([bytes[i], bytes[i + 1]])
}

/// Two's complement interpretation of a single byte.
pub fn signed8(bytes: &[u8], i: usize) -> i8 {
    bytes[i] as i8
}

pub fn unsigned8(bytes: &[u8], i: usize) -> u8 {
    bytes[i]
}

/// Big endian 24 bit value starting at `bytes[i]`, the format of the ms5611
/// adc result.
pub fn unsigned24_be(bytes: &[u8], i: usize) -> u32 {
    u32::from_be_bytes([0, bytes[i], bytes[i + 1], bytes[i + 2]])
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn endianness_is_the_only_difference() {
        for b0 in 0..=u8::MAX {
            for b1 in [0x00, 0x01, 0x7f, 0x80, 0xa5, 0xff] {
                assert_eq!(
                    unsigned16_le(&[b0, b1], 0),
                    unsigned16_be(&[b1, b0], 0)
                );
            }
        }
    }

    #[test]
    fn signed_and_unsigned_agree_below_sign_bit() {
        for value in (0..=u16::MAX).step_by(7) {
            let bytes = value.to_le_bytes();
            let signed = i32::from(signed16_le(&bytes, 0));
            let unsigned = i32::from(unsigned16_le(&bytes, 0));
            if value < 0x8000 {
                assert_eq!(signed, unsigned);
            } else {
                assert_eq!(unsigned - signed, 0x10000);
            }
        }
    }

    #[rstest]
    #[case(0x00, 0)]
    #[case(0x7f, 127)]
    #[case(0x80, -128)]
    #[case(0xfe, -2)]
    #[case(0xff, -1)]
    fn signed8_subtracts_256_above_127(#[case] byte: u8, #[case] expected: i8) {
        assert_eq!(signed8(&[0xaa, byte], 1), expected);
        assert_eq!(unsigned8(&[0xaa, byte], 1), byte);
    }

    #[test]
    fn reads_at_an_offset() {
        let bytes = [0x00, 0x18, 0xfc, 0x8a, 0xa2, 0x1a];
        assert_eq!(signed16_le(&bytes, 1), -1000);
        assert_eq!(unsigned24_be(&bytes, 3), 0x8a_a21a);
    }

    #[test]
    #[should_panic]
    fn index_past_the_end_panics() {
        unsigned16_le(&[0x01], 0);
    }
}
