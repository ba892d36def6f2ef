//! Dallas/Maxim CRC functions used on the 1-Wire bus.
//!
//! The 8-bit CRC (polynomial x^8 + x^5 + x^4 + 1) protects ROM codes and
//! scratchpads. The 16-bit CRC is used by devices with larger payloads.

use crate::Error;
use core::fmt::Debug;

/// Tiny 2x16 entry table, low nibble first then high nibble.
const CRC8_NIBBLE_TABLE: [u8; 32] = [
    0x00, 0x5E, 0xBC, 0xE2, 0x61, 0x3F, 0xDD, 0x83, 0xC2, 0x9C, 0x7E, 0x20, 0xA3, 0xFD, 0x1F, 0x41,
    0x00, 0x9D, 0x23, 0xBE, 0x46, 0xDB, 0x65, 0xF8, 0x8C, 0x11, 0xAF, 0x32, 0xCA, 0x57, 0xE9, 0x74,
];

const ODD_PARITY: [u8; 16] = [0, 1, 1, 0, 1, 0, 0, 1, 1, 0, 0, 1, 0, 1, 1, 0];

/// Continues a bitwise CRC8 computation from `crc` over `data`.
pub fn compute_partial_crc8(crc: u8, data: &[u8]) -> u8 {
    let mut crc = crc;
    for byte in data.iter() {
        let mut byte = *byte;
        for _ in 0..8 {
            let mix = (crc ^ byte) & 0x01;
            crc >>= 1;
            if mix != 0x00 {
                crc ^= 0x8C;
            }
            byte >>= 1;
        }
    }
    crc
}

/// Continues a table driven CRC8 computation from `crc` over `data`.
///
/// Produces the same result as [`compute_partial_crc8`].
pub fn compute_partial_crc8_table(crc: u8, data: &[u8]) -> u8 {
    data.iter().fold(crc, |crc, byte| {
        let idx = crc ^ byte;
        CRC8_NIBBLE_TABLE[(idx & 0x0F) as usize] ^ CRC8_NIBBLE_TABLE[16 + (idx >> 4) as usize]
    })
}

/// CRC8 of `data`, as found in byte 7 of a ROM code and byte 8 of a scratchpad.
pub fn crc8(data: &[u8]) -> u8 {
    compute_partial_crc8_table(0, data)
}

/// Fails with [`Error::CrcMismatch`] unless `crc8(data) == expected`.
pub fn ensure_crc8<E: Debug>(data: &[u8], expected: u8) -> Result<(), Error<E>> {
    let computed = crc8(data);
    if computed != expected {
        Err(Error::CrcMismatch(computed, expected))
    } else {
        Ok(())
    }
}

/// Running CRC16 of `data`, starting from `crc`.
pub fn crc16(data: &[u8], crc: u16) -> u16 {
    let mut crc = crc;
    for byte in data {
        let mut cdata = (*byte as u16 ^ crc) & 0xFF;
        crc >>= 8;

        if ODD_PARITY[(cdata & 0x0F) as usize] ^ ODD_PARITY[(cdata >> 4) as usize] != 0 {
            crc ^= 0xC001;
        }

        cdata <<= 6;
        crc ^= cdata;
        cdata <<= 1;
        crc ^= cdata;
    }
    crc
}

/// Checks `data` against the two CRC16 bytes a device transmits.
///
/// Devices send the CRC16 inverted and least significant byte first.
pub fn check_crc16(data: &[u8], inverted_crc: [u8; 2], crc: u16) -> bool {
    let crc = !crc16(data, crc);
    (crc & 0xFF) as u8 == inverted_crc[0] && (crc >> 8) as u8 == inverted_crc[1]
}
