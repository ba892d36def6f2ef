use core::fmt::{Display, Formatter, Result as FmtResult};

/// Supported DS18xxx temperature sensor models, by family code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Family {
    /// DS18S20 and DS1820
    Ds18s20 = 0x10,
    Ds18b20 = 0x28,
    Ds1822 = 0x22,
    Ds1825 = 0x3B,
    Ds28ea00 = 0x42,
}

/// How a family stores its temperature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    /// 9-bit register extended through COUNT_REMAIN / COUNT_PER_C,
    /// no configuration register
    Legacy,
    /// 9 to 12 bit register selected through the configuration register
    Modern,
}

impl Family {
    pub const ALL: [Family; 5] = [
        Family::Ds18s20,
        Family::Ds18b20,
        Family::Ds1822,
        Family::Ds1825,
        Family::Ds28ea00,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.code() == code)
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn generation(self) -> Generation {
        match self {
            Family::Ds18s20 => Generation::Legacy,
            _ => Generation::Modern,
        }
    }

    pub fn has_configuration_register(self) -> bool {
        self.generation() == Generation::Modern
    }
}

impl Display for Family {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let name = match self {
            Family::Ds18s20 => "DS18S20",
            Family::Ds18b20 => "DS18B20",
            Family::Ds1822 => "DS1822",
            Family::Ds1825 => "DS1825",
            Family::Ds28ea00 => "DS28EA00",
        };
        f.write_str(name)
    }
}
