//! Line symbols for the UART framing trick.
//!
//! At the data baud rate one UART frame lasts about one 1-Wire time slot.
//! Sending `0xFF` only pulls the line low for the start bit, which a device
//! reads as a 1. Sending `0x00` keeps it low for the whole frame, a 0. A
//! device answering a read slot with 0 stretches the low phase, so the echoed
//! frame comes back as something other than `0xFF`.

/// Frame that writes a 1 bit, also used to open a read slot
pub const SYMBOL_ONE: u8 = 0xFF;

/// Frame that writes a 0 bit
pub const SYMBOL_ZERO: u8 = 0x00;

/// Symbols per encoded byte
pub const SYMBOLS_PER_BYTE: usize = 8;

/// Symbol for a single bit
#[inline]
pub fn encode_bit(bit: bool) -> u8 {
    if bit {
        SYMBOL_ONE
    } else {
        SYMBOL_ZERO
    }
}

/// Only an untouched frame counts as a 1, everything else decodes to 0
#[inline]
pub fn decode_bit(symbol: u8) -> bool {
    symbol == SYMBOL_ONE
}

/// Expands `byte` into eight symbols, least significant bit first.
pub fn encode(byte: u8) -> [u8; SYMBOLS_PER_BYTE] {
    let mut symbols = [SYMBOL_ZERO; SYMBOLS_PER_BYTE];
    let mut byte = byte;
    for symbol in symbols.iter_mut() {
        *symbol = encode_bit(byte & 0x01 == 0x01);
        byte >>= 1;
    }
    symbols
}

/// Collapses eight received symbols back into a byte.
pub fn decode(symbols: &[u8; SYMBOLS_PER_BYTE]) -> u8 {
    let mut byte = 0_u8;
    for symbol in symbols {
        byte >>= 1;
        if decode_bit(*symbol) {
            byte |= 0x80;
        }
    }
    byte
}
