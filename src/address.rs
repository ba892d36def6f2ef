use crate::crc::{crc8, ensure_crc8};
use crate::{DeviceSearch, Driver, Error, Family, UartWire};
use byteorder::{ByteOrder, LittleEndian};
use core::{
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    ops::{Deref, DerefMut},
    str::FromStr,
};

#[derive(Debug, Clone, Copy, PartialOrd, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Address {
    raw: [u8; Self::BYTES as usize],
}

impl Default for Address {
    fn default() -> Self {
        Self::from([0; Self::BYTES as usize])
    }
}

impl From<[u8; Self::BYTES as usize]> for Address {
    fn from(raw: [u8; Self::BYTES as usize]) -> Self {
        Address { raw }
    }
}

impl From<Address> for [u8; Address::BYTES as usize] {
    fn from(addr: Address) -> [u8; Address::BYTES as usize] {
        addr.raw
    }
}

impl Deref for Address {
    type Target = [u8; Self::BYTES as usize];

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

impl DerefMut for Address {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.raw
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        self.deref() as _
    }
}

impl AsMut<[u8]> for Address {
    fn as_mut(&mut self) -> &mut [u8] {
        self.deref_mut() as _
    }
}

impl Address {
    /// The length of device address in bytes
    pub const BYTES: u8 = 8;

    /// The length of device address in bits
    pub const BITS: u8 = Self::BYTES * 8;

    pub fn family_code(&self) -> u8 {
        self[0]
    }

    /// 48-bit serial number, little endian on the wire
    pub fn serial_number(&self) -> u64 {
        LittleEndian::read_u48(&self[1..7])
    }

    /// CRC byte transmitted with the ROM code
    pub fn crc(&self) -> u8 {
        self[7]
    }

    /// The CRC8 over the family code and serial matches the CRC byte
    pub fn is_valid(&self) -> bool {
        crc8(&self[..7]) == self.crc()
    }

    pub fn ensure_valid<E: Debug>(&self) -> Result<(), Error<E>> {
        ensure_crc8(&self[..7], self.crc())
    }

    /// The family code is one of the supported temperature sensors,
    /// independent of [`Address::is_valid`]
    pub fn is_supported_family(&self) -> bool {
        Family::from_code(self.family_code()).is_some()
    }

    pub fn family<E: Debug>(&self) -> Result<Family, Error<E>> {
        Family::from_code(self.family_code())
            .ok_or_else(|| Error::UnsupportedFamily(self.family_code()))
    }
}

/// Address parse error
#[derive(Debug, PartialEq, Eq)]
pub enum AddressError {
    /// Fewer than 16 hex digits
    NotEnough,
    /// Not a hex digit
    Invalid,
}

fn hex_to_u8(c: char) -> Option<u8> {
    c.to_digit(16).map(|d| d as u8)
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut addr = Address::default();
        let mut chars = s.chars().filter(|c| !c.is_whitespace() && *c != ':');

        for i in 0..Self::BYTES as usize {
            match (chars.next(), chars.next()) {
                (Some(h), Some(l)) => match (hex_to_u8(h), hex_to_u8(l)) {
                    (Some(h), Some(l)) => {
                        addr[i] = (h << 4) | l;
                    }
                    _ => return Err(AddressError::Invalid),
                },
                _ => return Err(AddressError::NotEnough),
            }
        }

        Ok(addr)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self[0], self[1], self[2], self[3], self[4], self[5], self[6], self[7],
        )
    }
}

impl Address {
    /// First device of the given family
    ///
    /// The search is seeded with the family code, so if any device of that
    /// family is present it is the one found first.
    pub fn search_first<W: UartWire>(
        driver: &mut Driver<W>,
        family_code: u8,
    ) -> Result<Option<Self>, Error<W::Error>> {
        let mut search = DeviceSearch::new_for_family(family_code);
        Ok(driver
            .search_next(&mut search)?
            .filter(|address| address.family_code() == family_code))
    }
}
