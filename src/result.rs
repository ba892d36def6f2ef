use core::fmt::{Debug, Display, Formatter, Result as FmtResult};

/// Error type
#[derive(Debug)]
pub enum Error<E: Sized + Debug> {
    /// No presence pulse after reset
    NoPresence,
    /// Search read both bits high in the middle of a ROM code
    WireFault,
    /// Computed and received CRC differ: (computed, received)
    CrcMismatch(u8, u8),
    /// The device did not answer with a valid scratchpad
    Disconnected,
    /// CRC-valid address of a model this crate does not drive
    UnsupportedFamily(u8),
    /// The configuration register holds an unknown pattern
    UnknownResolution(u8),
    /// A bounded wait ran out of budget
    Timeout,
    PortError(E),
}

impl<E: Sized + Debug> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::PortError(e)
    }
}

impl<E: Sized + Debug> Display for Error<E> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Error::NoPresence => write!(f, "no presence pulse on the bus"),
            Error::WireFault => write!(f, "no device answered the search slot"),
            Error::CrcMismatch(computed, received) => write!(
                f,
                "crc mismatch: computed {:#04x}, received {:#04x}",
                computed, received
            ),
            Error::Disconnected => write!(f, "device disconnected"),
            Error::UnsupportedFamily(code) => write!(f, "unsupported family code {:#04x}", code),
            Error::UnknownResolution(config) => {
                write!(f, "unknown configuration register {:#04x}", config)
            }
            Error::Timeout => write!(f, "timed out"),
            Error::PortError(e) => write!(f, "port error: {:?}", e),
        }
    }
}
