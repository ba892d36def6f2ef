use core::fmt::Debug;
use embedded_hal::digital::OutputPin;

/// Half-duplex UART wired to the 1-Wire data line (TX and RX share the pin)
pub trait UartWire {
    type Error: Debug;

    /// Reconfigures the UART baud rate
    fn set_baud_rate(&mut self, baud: u32) -> Result<(), Self::Error>;

    /// Transmits `tx` and receives the same number of echoed frames into `rx`.
    ///
    /// Must block until the last frame has been received. `tx` and `rx` have
    /// the same length.
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), Self::Error>;

    /// Whether [`UartWire::set_strong_pullup`] drives real hardware
    fn has_strong_pullup(&self) -> bool {
        false
    }

    /// Drives the external strong pull-up, if one is fitted
    fn set_strong_pullup(&mut self, _active: bool) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl<T: UartWire + ?Sized> UartWire for &mut T {
    type Error = T::Error;

    fn set_baud_rate(&mut self, baud: u32) -> Result<(), Self::Error> {
        T::set_baud_rate(self, baud)
    }

    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), Self::Error> {
        T::transfer(self, tx, rx)
    }

    fn has_strong_pullup(&self) -> bool {
        T::has_strong_pullup(self)
    }

    fn set_strong_pullup(&mut self, active: bool) -> Result<(), Self::Error> {
        T::set_strong_pullup(self, active)
    }
}

/// Error of a [`WithPullup`] wire
#[derive(Debug)]
pub enum PullupError<U, P> {
    Uart(U),
    Pullup(P),
}

/// UART wire with an external strong pull-up transistor
///
/// Parasite powered devices draw their conversion and EEPROM write current
/// from the data line, which the UART output stage cannot supply.
pub struct WithPullup<W, P> {
    wire: W,
    pullup: P,
    active_high: bool,
}

impl<W, P> WithPullup<W, P> {
    /// `active_high` tells which pin level switches the pull-up on
    pub fn new(wire: W, pullup: P, active_high: bool) -> Self {
        Self {
            wire,
            pullup,
            active_high,
        }
    }

    pub fn into_inner(self) -> (W, P) {
        (self.wire, self.pullup)
    }
}

impl<W: UartWire, P: OutputPin> UartWire for WithPullup<W, P> {
    type Error = PullupError<W::Error, P::Error>;

    fn set_baud_rate(&mut self, baud: u32) -> Result<(), Self::Error> {
        self.wire.set_baud_rate(baud).map_err(PullupError::Uart)
    }

    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), Self::Error> {
        self.wire.transfer(tx, rx).map_err(PullupError::Uart)
    }

    fn has_strong_pullup(&self) -> bool {
        true
    }

    fn set_strong_pullup(&mut self, active: bool) -> Result<(), Self::Error> {
        if active == self.active_high {
            self.pullup.set_high()
        } else {
            self.pullup.set_low()
        }
        .map_err(PullupError::Pullup)
    }
}
