use crate::crc::{crc8, ensure_crc8};
use crate::{Error, Generation};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use core::fmt::Debug;

/// Conversion resolution, stored as the configuration register pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Resolution {
    Bits9 = 0b0001_1111,
    Bits10 = 0b0011_1111,
    Bits11 = 0b0101_1111,
    Bits12 = 0b0111_1111,
}

impl Resolution {
    /// Clamps `bits` into 9..=12
    pub fn from_bits(bits: u8) -> Self {
        match bits {
            0..=9 => Resolution::Bits9,
            10 => Resolution::Bits10,
            11 => Resolution::Bits11,
            _ => Resolution::Bits12,
        }
    }

    pub fn from_config(config: u8) -> Option<Self> {
        match config {
            0x1F => Some(Resolution::Bits9),
            0x3F => Some(Resolution::Bits10),
            0x5F => Some(Resolution::Bits11),
            0x7F => Some(Resolution::Bits12),
            _ => None,
        }
    }

    pub fn bits(&self) -> u8 {
        match self {
            Resolution::Bits9 => 9,
            Resolution::Bits10 => 10,
            Resolution::Bits11 => 11,
            Resolution::Bits12 => 12,
        }
    }

    pub fn config(&self) -> u8 {
        *self as u8
    }

    /// Worst case conversion time from the datasheet
    pub fn time_ms(&self) -> u16 {
        millis_to_wait_for_conversion(self.bits())
    }
}

/// Worst case conversion time for a resolution given in bits, anything
/// outside 9..=11 waits for the 12 bit time
pub fn millis_to_wait_for_conversion(bits: u8) -> u16 {
    match bits {
        9 => 94,
        10 => 188,
        11 => 375,
        _ => 750,
    }
}

/// The 9 byte register file of a temperature sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Scratchpad {
    raw: [u8; Self::BYTES],
}

impl From<[u8; Scratchpad::BYTES]> for Scratchpad {
    fn from(raw: [u8; Scratchpad::BYTES]) -> Self {
        Scratchpad { raw }
    }
}

impl AsRef<[u8]> for Scratchpad {
    fn as_ref(&self) -> &[u8] {
        &self.raw
    }
}

impl AsMut<[u8]> for Scratchpad {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.raw
    }
}

impl Scratchpad {
    pub const BYTES: usize = 9;

    pub const TEMP_LSB: usize = 0;
    pub const TEMP_MSB: usize = 1;
    pub const HIGH_ALARM_TEMP: usize = 2;
    pub const LOW_ALARM_TEMP: usize = 3;
    pub const CONFIGURATION: usize = 4;
    pub const INTERNAL_BYTE: usize = 5;
    pub const COUNT_REMAIN: usize = 6;
    pub const COUNT_PER_C: usize = 7;
    pub const CRC: usize = 8;

    pub fn bytes(&self) -> &[u8; Self::BYTES] {
        &self.raw
    }

    pub fn is_valid(&self) -> bool {
        crc8(&self.raw[..Self::CRC]) == self.raw[Self::CRC]
    }

    pub fn ensure_valid<E: Debug>(&self) -> Result<(), Error<E>> {
        ensure_crc8(&self.raw[..Self::CRC], self.raw[Self::CRC])
    }

    /// Recomputes the CRC byte after local edits
    pub fn update_crc(&mut self) {
        self.raw[Self::CRC] = crc8(&self.raw[..Self::CRC]);
    }

    /// Temperature register as the device stores it
    pub fn temperature_register(&self) -> i16 {
        LittleEndian::read_i16(&self.raw[Self::TEMP_LSB..=Self::TEMP_MSB])
    }

    pub fn high_alarm(&self) -> i8 {
        self.raw[Self::HIGH_ALARM_TEMP] as i8
    }

    pub fn low_alarm(&self) -> i8 {
        self.raw[Self::LOW_ALARM_TEMP] as i8
    }

    pub fn set_high_alarm(&mut self, celsius: i8) {
        self.raw[Self::HIGH_ALARM_TEMP] = celsius as u8;
    }

    pub fn set_low_alarm(&mut self, celsius: i8) {
        self.raw[Self::LOW_ALARM_TEMP] = celsius as u8;
    }

    /// Alarm bytes read as one value, high alarm byte first
    pub fn user_data(&self) -> i16 {
        BigEndian::read_i16(&self.raw[Self::HIGH_ALARM_TEMP..=Self::LOW_ALARM_TEMP])
    }

    pub fn set_user_data(&mut self, data: i16) {
        BigEndian::write_i16(
            &mut self.raw[Self::HIGH_ALARM_TEMP..=Self::LOW_ALARM_TEMP],
            data,
        );
    }

    pub fn configuration(&self) -> u8 {
        self.raw[Self::CONFIGURATION]
    }

    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.raw[Self::CONFIGURATION] = resolution.config();
    }

    /// Resolution of a device of the given generation, legacy parts always
    /// report 12 bits
    pub fn resolution<E: Debug>(&self, generation: Generation) -> Result<Resolution, Error<E>> {
        match generation {
            Generation::Legacy => Ok(Resolution::Bits12),
            Generation::Modern => Resolution::from_config(self.configuration())
                .ok_or(Error::UnknownResolution(self.configuration())),
        }
    }

    pub fn count_remain(&self) -> u8 {
        self.raw[Self::COUNT_REMAIN]
    }

    pub fn count_per_c(&self) -> u8 {
        self.raw[Self::COUNT_PER_C]
    }

    /// Temperature in 1/128 °C
    ///
    /// Legacy parts only have a 9 bit register, the remaining precision is
    /// derived from COUNT_REMAIN and COUNT_PER_C:
    /// `T = TEMP_READ - 0.125 + (COUNT_PER_C - COUNT_REMAIN) / COUNT_PER_C`.
    /// With COUNT_PER_C at 0 the plain 9 bit value is returned.
    pub fn raw_temperature(&self, generation: Generation) -> i16 {
        let msb = self.raw[Self::TEMP_MSB] as u16;
        let lsb = self.raw[Self::TEMP_LSB] as u16;
        let raw = (msb << 11 | lsb << 3) as i16;

        match generation {
            Generation::Modern => raw,
            Generation::Legacy if self.count_per_c() == 0 => raw << 3,
            Generation::Legacy => {
                let count_per_c = self.count_per_c() as i32;
                let count_remain = self.count_remain() as i32;
                let extended = ((raw as i32 & 0xFFF0) << 3) - 16
                    + (((count_per_c - count_remain) << 7) / count_per_c);
                extended as i16
            }
        }
    }
}
