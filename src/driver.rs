use crate::codec::{self, SYMBOLS_PER_BYTE, SYMBOL_ONE};
use crate::{Address, BusConfig, Command, DeviceSearch, Error, OpCode, UartWire};
use core::fmt::Debug;
use log::trace;

/// One emulated 1-Wire bus
///
/// Owns the UART and the incremental ROM search state. Operations block
/// until the UART has echoed every frame and never interleave.
pub struct Driver<W: UartWire> {
    wire: W,
    config: BusConfig,
    pub(crate) search: DeviceSearch,
    pub(crate) alarm_search: DeviceSearch,
}

impl<E: Debug, W: UartWire<Error = E>> Driver<W> {
    pub fn new(wire: W) -> Self {
        Self::with_config(wire, BusConfig::default())
    }

    pub fn with_config(wire: W, config: BusConfig) -> Self {
        Driver {
            wire,
            config,
            search: DeviceSearch::new(),
            alarm_search: DeviceSearch::new(),
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn wire(&self) -> &W {
        &self.wire
    }

    pub fn wire_mut(&mut self) -> &mut W {
        &mut self.wire
    }

    pub fn into_inner(self) -> W {
        self.wire
    }

    /// Puts the UART to the idle data rate
    pub fn init(&mut self) -> Result<(), E> {
        self.wire.set_baud_rate(self.config.data_baud)
    }

    /// Performs a reset and listens for a presence pulse
    ///
    /// A device answering the reset pulls the line low while the slow reset
    /// frame is still being sampled, so the echoed frame differs from the
    /// one sent. Returns `Err(NoPresence)` if the frame came back untouched.
    pub fn reset(&mut self) -> Result<(), Error<E>> {
        if self.reset_presence()? {
            Ok(())
        } else {
            Err(Error::NoPresence)
        }
    }

    pub fn reset_presence(&mut self) -> Result<bool, Error<E>> {
        let mut echo = [0u8];
        self.wire.set_baud_rate(self.config.reset_baud)?;
        let sent = self
            .wire
            .transfer(&[BusConfig::RESET_PATTERN], &mut echo);
        // restore the data rate even if the transfer failed
        self.wire.set_baud_rate(self.config.data_baud)?;
        sent?;

        let presence = echo[0] != BusConfig::RESET_PATTERN;
        trace!("reset: echo {:#04x}, presence {}", echo[0], presence);
        Ok(presence)
    }

    /// Writes every byte of `command` while sampling the line in the same
    /// slots, optionally preceded by a reset.
    ///
    /// Once the byte index reaches `read_start` the sampled bytes are stored
    /// into `data` until it is full. `None` never captures. Bytes meant to
    /// be read are sent as `0xFF` so the device can drive the slot.
    pub fn send(
        &mut self,
        reset: bool,
        command: &[u8],
        data: &mut [u8],
        read_start: Option<usize>,
    ) -> Result<(), Error<E>> {
        if reset {
            self.reset()?;
        }

        let mut captured = 0;
        for (index, byte) in command.iter().enumerate() {
            let received = self.touch_byte(*byte)?;
            if let Some(start) = read_start {
                if index >= start && captured < data.len() {
                    data[captured] = received;
                    captured += 1;
                }
            }
        }
        Ok(())
    }

    pub fn reset_write_only(&mut self, write: &[u8]) -> Result<(), Error<E>> {
        self.reset()?;
        self.write_bytes(write)?;
        Ok(())
    }

    pub fn reset_select_write_read(
        &mut self,
        addr: &Address,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Error<E>> {
        self.reset()?;
        self.select(addr)?;
        self.write_bytes(write)?;
        self.read_bytes(read)?;
        Ok(())
    }

    pub fn reset_select_write_only(
        &mut self,
        addr: &Address,
        write: &[u8],
    ) -> Result<(), Error<E>> {
        self.reset()?;
        self.select(addr)?;
        self.write_bytes(write)?;
        Ok(())
    }

    pub fn reset_skip_write_only(&mut self, write: &[u8]) -> Result<(), Error<E>> {
        self.reset()?;
        self.skip()?;
        self.write_bytes(write)?;
        Ok(())
    }

    /// Addresses every device at once
    pub fn skip(&mut self) -> Result<(), E> {
        self.write_command(Command::SkipRom)
    }

    /// Addresses the single device with the given ROM code
    pub fn select(&mut self, addr: &Address) -> Result<(), E> {
        self.write_command(Command::MatchRom)?;
        self.write_bytes(addr.as_ref())
    }

    pub fn write_command(&mut self, cmd: impl OpCode) -> Result<(), E> {
        self.write_byte(cmd.op_code())
    }

    pub fn read_bytes(&mut self, dst: &mut [u8]) -> Result<(), E> {
        for d in dst {
            *d = self.read_byte()?;
        }
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), E> {
        for b in bytes {
            self.write_byte(*b)?;
        }
        Ok(())
    }

    pub fn read_byte(&mut self) -> Result<u8, E> {
        self.touch_byte(0xFF)
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<(), E> {
        self.touch_byte(byte).map(|_| ())
    }

    /// Writes `byte` and returns what the line carried in the same slots
    pub fn touch_byte(&mut self, byte: u8) -> Result<u8, E> {
        let tx = codec::encode(byte);
        let mut rx = [0u8; SYMBOLS_PER_BYTE];
        self.wire.transfer(&tx, &mut rx)?;
        Ok(codec::decode(&rx))
    }

    /// Opens a single read slot
    pub fn read_bit(&mut self) -> Result<bool, E> {
        let mut rx = [0u8];
        self.wire.transfer(&[SYMBOL_ONE], &mut rx)?;
        Ok(codec::decode_bit(rx[0]))
    }

    /// Opens two consecutive read slots in one transfer
    pub(crate) fn read_bit_pair(&mut self) -> Result<(bool, bool), E> {
        let mut rx = [0u8; 2];
        self.wire.transfer(&[SYMBOL_ONE, SYMBOL_ONE], &mut rx)?;
        Ok((codec::decode_bit(rx[0]), codec::decode_bit(rx[1])))
    }

    pub fn write_bit(&mut self, high: bool) -> Result<(), E> {
        let mut rx = [0u8];
        self.wire.transfer(&[codec::encode_bit(high)], &mut rx)
    }

    pub fn has_strong_pullup(&self) -> bool {
        self.wire.has_strong_pullup()
    }

    pub fn set_strong_pullup(&mut self, active: bool) -> Result<(), E> {
        self.wire.set_strong_pullup(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimBus, SimDevice};

    #[test]
    fn reset_reports_presence() {
        let mut driver = Driver::new(SimBus::new(&[SimDevice::ds18b20(1)]));
        assert!(driver.reset_presence().unwrap());
        assert_eq!(driver.wire().baud_history(), &[9600, 115_200]);

        assert!(driver.reset().is_ok());
        let wire = driver.into_inner();
        assert_eq!(wire.baud_history(), &[9600, 115_200, 9600, 115_200]);
    }

    #[test]
    fn reset_without_devices() {
        let mut driver = Driver::new(SimBus::new(&[]));
        assert!(!driver.reset_presence().unwrap());
        assert!(matches!(driver.reset(), Err(Error::NoPresence)));
    }

    #[test]
    fn send_fails_fast_without_presence() {
        let mut driver = Driver::new(SimBus::new(&[]));
        let mut data = [0u8; 1];
        assert!(matches!(
            driver.send(true, &[0xCC, 0x44], &mut data, None),
            Err(Error::NoPresence)
        ));
    }

    #[test]
    fn send_captures_from_read_start() {
        let device = SimDevice::ds18b20(3).with_scratchpad_temp(0x0191);
        let address = device.address();
        let mut driver = Driver::new(SimBus::new(&[device]));

        let mut query = [0xFFu8; 12];
        query[0] = Command::MatchRom.op_code();
        query[1..9].copy_from_slice(address.as_ref());
        query[9] = 0xBE;
        let mut data = [0u8; 2];
        driver.send(true, &query, &mut data, Some(10)).unwrap();
        assert_eq!(data, [0x91, 0x01]);
    }

    #[test]
    fn failed_reset_restores_data_rate() {
        let mut wire = SimBus::new(&[SimDevice::ds18b20(1)]);
        wire.fail_after(0);
        let mut driver = Driver::new(wire);
        assert!(matches!(driver.reset(), Err(Error::PortError(_))));
        assert_eq!(driver.wire().baud_history(), &[9600, 115_200]);
    }

    #[test]
    fn send_without_capture_leaves_buffer() {
        let mut driver = Driver::new(SimBus::new(&[SimDevice::ds18b20(1)]));
        let mut data = [0xAAu8; 2];
        driver.send(true, &[0xCC, 0xBE, 0xFF, 0xFF], &mut data, None).unwrap();
        assert_eq!(data, [0xAA, 0xAA]);
    }
}
