/// UART timing of the emulated bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// Baud rate during reset, one `0xF0` frame spans the reset pulse
    /// and the presence window
    pub reset_baud: u32,
    /// Baud rate for data slots, one frame per time slot
    pub data_baud: u32,
}

impl BusConfig {
    /// Frame sent during reset, the low nibble is the reset pulse
    pub const RESET_PATTERN: u8 = 0xF0;
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            reset_baud: 9600,
            data_baud: 115_200,
        }
    }
}

/// Conversion and persistence policy of a sensor session
#[cfg(feature = "dallas")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Block in `request_temperatures` until the conversion is done
    pub wait_for_conversion: bool,
    /// Poll the bus for conversion completion instead of a flat delay
    pub check_for_conversion: bool,
    /// Copy the scratchpad to EEPROM on every write
    pub auto_save_scratchpad: bool,
}

#[cfg(feature = "dallas")]
impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            wait_for_conversion: true,
            check_for_conversion: true,
            auto_save_scratchpad: true,
        }
    }
}
