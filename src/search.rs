use crate::{Address, Command, Driver, Error, UartWire};
use core::fmt::Debug;
use log::{debug, trace};

/// State of an incremental ROM search
///
/// Each call to [`Driver::search_next`] walks the ROM tree once and leaves
/// the branch to take next time in here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSearch {
    address: [u8; Address::BYTES as usize],
    last_discrepancy: Option<u8>,
    last_device: bool,
}

impl DeviceSearch {
    pub fn new() -> DeviceSearch {
        DeviceSearch::default()
    }

    /// Search that finds a device of `family` first, if one is present
    pub fn new_for_family(family: u8) -> DeviceSearch {
        let mut search = DeviceSearch::new();
        search.target(family);
        search
    }

    /// Forgets all progress, the next search starts from the beginning
    pub fn reset(&mut self) {
        *self = DeviceSearch::default();
    }

    /// Seeds the candidate with a family code and replays it on every
    /// branch up to the last bit
    pub fn target(&mut self, family: u8) {
        self.reset();
        self.address[0] = family;
        self.last_discrepancy = Some(Address::BITS - 1);
    }

    /// Bit index of the branch that will flip to 1 on the next pass
    pub fn last_discrepancy(&self) -> Option<u8> {
        self.last_discrepancy
    }

    /// The previous pass found the last device
    pub fn is_finished(&self) -> bool {
        self.last_device
    }

    fn is_bit_set_in_address(&self, bit: u8) -> bool {
        self.address[(bit / 8) as usize] & (0x01 << (bit % 8)) != 0x00
    }

    fn write_bit_in_address(&mut self, bit: u8, value: bool) {
        let mask = 0x01 << (bit % 8);
        if value {
            self.address[(bit / 8) as usize] |= mask;
        } else {
            self.address[(bit / 8) as usize] &= !mask;
        }
    }

    /// Direction to take where devices disagree at `bit`
    fn choose(&self, bit: u8) -> bool {
        match self.last_discrepancy {
            Some(last) if bit == last => true,
            Some(last) if bit < last => self.is_bit_set_in_address(bit),
            _ => false,
        }
    }

    pub fn into_iter<W: UartWire>(self, driver: &mut Driver<W>) -> DeviceSearchIter<'_, W> {
        DeviceSearchIter {
            search: Some(self),
            driver,
        }
    }
}

pub struct DeviceSearchIter<'a, W: UartWire> {
    search: Option<DeviceSearch>,
    driver: &'a mut Driver<W>,
}

impl<'a, W: UartWire> Iterator for DeviceSearchIter<'a, W> {
    type Item = Result<Address, Error<W::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut search = self.search.take()?;
        let result = self.driver.search_next(&mut search).transpose()?;
        if result.is_ok() {
            self.search = Some(search);
        }
        Some(result)
    }
}

impl<E: Debug, W: UartWire<Error = E>> Driver<W> {
    /// Restarts the bus-owned device enumeration
    pub fn reset_search(&mut self) {
        self.search.reset();
    }

    /// Restricts the next bus-owned search to a family
    pub fn target_search(&mut self, family: u8) {
        self.search.target(family);
    }

    /// Next device of the bus-owned enumeration
    pub fn search(&mut self) -> Result<Option<Address>, Error<E>> {
        let mut state = core::mem::take(&mut self.search);
        let result = self.search_with(&mut state, Command::SearchRom);
        self.search = state;
        result
    }

    pub fn reset_alarm_search(&mut self) {
        self.alarm_search.reset();
    }

    /// Next device that has its alarm flag raised
    pub fn alarm_search(&mut self) -> Result<Option<Address>, Error<E>> {
        let mut state = core::mem::take(&mut self.alarm_search);
        let result = self.search_with(&mut state, Command::AlarmSearch);
        self.alarm_search = state;
        result
    }

    pub fn search_next(&mut self, search: &mut DeviceSearch) -> Result<Option<Address>, Error<E>> {
        self.search_with(search, Command::SearchRom)
    }

    pub fn search_next_alarmed(
        &mut self,
        search: &mut DeviceSearch,
    ) -> Result<Option<Address>, Error<E>> {
        self.search_with(search, Command::AlarmSearch)
    }

    /// Walks the ROM tree once
    ///
    /// Every participating device sends its address bit followed by the
    /// complement, and the wired-AND line shows whether they agree. Where
    /// they disagree the branch is picked from the previous pass, and the
    /// deepest 0 branch taken becomes the discrepancy for the next one.
    /// The returned address is not CRC checked. Any error starts the next
    /// search over from the beginning.
    pub(crate) fn search_with(
        &mut self,
        search: &mut DeviceSearch,
        cmd: Command,
    ) -> Result<Option<Address>, Error<E>> {
        if search.last_device {
            return Ok(None);
        }

        let result = self.search_pass(search, cmd);
        if result.is_err() {
            search.reset();
        }
        result
    }

    fn search_pass(
        &mut self,
        search: &mut DeviceSearch,
        cmd: Command,
    ) -> Result<Option<Address>, Error<E>> {
        if !self.reset_presence()? {
            search.reset();
            return Ok(None);
        }

        self.write_command(cmd)?;

        let mut last_zero = None;
        for bit in 0..Address::BITS {
            let direction = match self.read_bit_pair()? {
                (true, true) => {
                    return if bit == 0 {
                        // nobody takes part, e.g. no alarmed device
                        search.reset();
                        Ok(None)
                    } else {
                        Err(Error::WireFault)
                    };
                }
                (true, false) => true,
                (false, true) => false,
                (false, false) => {
                    let direction = search.choose(bit);
                    if !direction {
                        last_zero = Some(bit);
                    }
                    trace!("search: discrepancy at bit {}, taking {}", bit, direction as u8);
                    direction
                }
            };
            search.write_bit_in_address(bit, direction);
            self.write_bit(direction)?;
        }

        search.last_discrepancy = last_zero;
        search.last_device = last_zero.is_none();

        let address = Address::from(search.address);
        debug!("search: found {}", address);
        Ok(Some(address))
    }
}
