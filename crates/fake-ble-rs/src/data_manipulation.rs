//! Byte level transformations required by BLE's link layer.

use alloc::{string::String, vec::Vec};
use core::fmt::Write;

/// The polynomial used by BLE's 24 bit CRC (`x^24 + x^10 + x^9 + x^6 + x^4 + x^3 + x + 1`).
pub const CRC24_POLYNOMIAL: u32 = 0x65B;

/// The CRC24 initial value used on BLE advertising channels.
pub const CRC24_INIT: u32 = 0x555555;

/// The chunk type used by default in [`chunk()`]: "Service Data - 16-bit UUID".
pub const SERVICE_DATA: u8 = 0x16;

/// Reverse the bit order of a single `byte`.
pub const fn reverse_bits_in_byte(byte: u8) -> u8 {
    byte.reverse_bits()
}

/// Reverse the bit order of every byte in `buf` (in place).
///
/// The order of the bytes is unchanged.
pub fn reverse_bits(buf: &mut [u8]) {
    for byte in buf {
        *byte = reverse_bits_in_byte(*byte);
    }
}

/// Pack the given `data` into a BLE "AD structure" (a chunk).
///
/// The result is `[data.len() + 1, data_type] ++ data`.
/// The length is a single byte, so `data` longer than 254 bytes will not be
/// described correctly. Advertisements can never carry that much data anyway;
/// see [`FakeBle::len_available()`](fn@crate::FakeBle::len_available).
pub fn chunk(data: &[u8], data_type: u8) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len() + 2);
    result.push((data.len() + 1) as u8);
    result.push(data_type);
    result.extend_from_slice(data);
    result
}

/// Whiten (or de-whiten) the given `buf` in place, seeded with the given `coefficient`.
///
/// Whitening scrambles the data so that the radio never transmits long runs of
/// identical bits. Applying it twice with the same `coefficient` restores `buf`.
/// The given `coefficient` shall be derived from the index of
/// [`BLE_CHANNEL`](value@crate::BLE_CHANNEL) for the radio channel that
/// transmits or receives the data; see
/// [`BleChannels::coefficient()`](fn@crate::BleChannels::coefficient).
///
/// Using a `coefficient` for the wrong channel does not fail. It just yields garbage.
pub fn whiten(buf: &mut [u8], coefficient: u8) {
    let mut lfsr = coefficient;
    for byte in buf {
        for bit in 0..8 {
            if lfsr & 1 == 1 {
                lfsr ^= 0x88;
                *byte ^= 1 << bit;
            }
            lfsr >>= 1;
        }
    }
}

/// Calculate a 24 bit CRC checksum for the given `data` using BLE defaults.
///
/// The returned buffer shall be appended to the transmitted payload
/// *before* applying [`whiten()`] and [`reverse_bits()`].
pub fn crc24_ble(data: &[u8]) -> [u8; 3] {
    crc24_ble_with(data, CRC24_POLYNOMIAL, CRC24_INIT)
}

/// Calculate a 24 bit CRC checksum using a custom `degree_polynomial` and `init` value.
///
/// Each input byte is processed with its bits reversed, and the resulting
/// register is serialized (big endian) with the bits of each byte reversed.
pub fn crc24_ble_with(data: &[u8], degree_polynomial: u32, init: u32) -> [u8; 3] {
    const MSB: u32 = 1 << 23;
    let mut register = init & 0xFF_FFFF;
    for byte in data {
        register ^= (reverse_bits_in_byte(*byte) as u32) << 16;
        for _ in 0..8 {
            let carry = register & MSB != 0;
            register <<= 1;
            if carry {
                register ^= degree_polynomial;
            }
        }
        register &= 0xFF_FFFF;
    }
    let [_, high, mid, low] = register.to_be_bytes();
    let mut result = [high, mid, low];
    reverse_bits(&mut result);
    result
}

/// Represent the given `buf` as a string of uppercase hexadecimal bytes.
///
/// Set `reverse` to print the last byte first (how MAC addresses are usually displayed).
/// The `delimit` string is inserted between each byte.
pub fn address_repr(buf: &[u8], reverse: bool, delimit: &str) -> String {
    let mut result = String::with_capacity(buf.len() * (2 + delimit.len()));
    let len = buf.len();
    for i in 0..len {
        let byte = if reverse { buf[len - 1 - i] } else { buf[i] };
        if i > 0 {
            result.push_str(delimit);
        }
        // writing to a String never fails
        let _ = write!(result, "{byte:02X}");
    }
    result
}

#[cfg(test)]
mod test {
    use super::{
        address_repr, chunk, crc24_ble, crc24_ble_with, reverse_bits, reverse_bits_in_byte,
        whiten, CRC24_INIT, CRC24_POLYNOMIAL, SERVICE_DATA,
    };
    use crate::BleChannels;

    #[test]
    fn reverse_byte() {
        assert_eq!(reverse_bits_in_byte(0x01), 0x80);
        assert_eq!(reverse_bits_in_byte(0x42), 0x42);
        assert_eq!(reverse_bits_in_byte(0xF0), 0x0F);
        for byte in 0..=u8::MAX {
            assert_eq!(reverse_bits_in_byte(reverse_bits_in_byte(byte)), byte);
        }
    }

    const HELLO: &[u8; 11] = b"Hello World";

    #[test]
    fn reverse() {
        let mut buf = *HELLO;
        reverse_bits(&mut buf);
        assert_eq!(
            buf,
            [0x12, 0xA6, 0x36, 0x36, 0xF6, 0x04, 0xEA, 0xF6, 0x4E, 0x36, 0x26]
        );
        reverse_bits(&mut buf);
        assert_eq!(&buf, HELLO);
        reverse_bits(&mut []);
    }

    #[test]
    fn chunking() {
        assert_eq!(chunk(b"\x0f\x18\x55", SERVICE_DATA), b"\x04\x16\x0f\x18\x55");
        assert_eq!(chunk(b"\x05", 1), [2, 1, 5]);
        assert_eq!(chunk(b"", 0xFF), [1, 0xFF]);
    }

    #[test]
    fn whitening() {
        // the last BLE channel (39)
        let mut buf = *HELLO;
        whiten(&mut buf, BleChannels::coefficient(2));
        assert_eq!(
            buf,
            [0x57, 0x52, 0x26, 0x33, 0xEA, 0xD6, 0xCB, 0xF5, 0xB3, 0xBA, 0xA1]
        );
    }

    #[test]
    fn whitening_is_symmetric_on_every_channel() {
        let original: [u8; 32] = core::array::from_fn(|i| (i as u8).wrapping_mul(37));
        for index in 0..3 {
            let coefficient = BleChannels::coefficient(index);
            let mut buf = original;
            whiten(&mut buf, coefficient);
            assert_ne!(buf, original);
            whiten(&mut buf, coefficient);
            assert_eq!(buf, original);
        }
    }

    #[test]
    fn crc() {
        let checksum = crc24_ble(HELLO);
        assert_eq!(checksum, [0xB6, 0x8C, 0xB0]);
        assert_eq!(crc24_ble_with(HELLO, CRC24_POLYNOMIAL, CRC24_INIT), checksum);
        assert_ne!(crc24_ble(b"Hello world"), checksum);
    }

    #[test]
    fn crc_of_nothing() {
        // only the (bit reversed) init value remains
        assert_eq!(crc24_ble(b""), [0xAA, 0xAA, 0xAA]);
        assert_eq!(crc24_ble_with(b"", 0x65B, 0xF0F0F0), [0x0F, 0x0F, 0x0F]);
    }

    #[test]
    fn hex_repr() {
        let mac = [0x01, 0x02, 0x03, 0xAB, 0xCD, 0xEF];
        assert_eq!(address_repr(&mac, true, ":"), "EF:CD:AB:03:02:01");
        assert_eq!(address_repr(&mac, false, ""), "010203ABCDEF");
        assert_eq!(address_repr(&[], false, " "), "");
    }
}
