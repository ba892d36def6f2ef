//! DS18xxx temperature sensors on a UART driven bus.
//!
//! [`DallasTemperature`] keeps the bus wide state: the enumerated devices,
//! whether any of them is parasite powered and the highest resolution in
//! use, which decides how long a broadcast conversion takes. Scratchpads
//! are read fresh from the device on every access.

use crate::temperature::{
    raw_to_celsius, raw_to_fahrenheit, raw_to_whole_celsius, DEVICE_DISCONNECTED_C,
    DEVICE_DISCONNECTED_F, DEVICE_DISCONNECTED_RAW,
};
use crate::{
    millis_to_wait_for_conversion, Address, Driver, Error, Family, Generation, OpCode,
    Resolution, Scratchpad, SessionConfig, UartWire,
};
use core::fmt::Debug;
use embedded_hal::delay::DelayNs;
use log::{debug, warn};

/// Function commands of the DS18xxx family
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Convert = 0x44,
    WriteScratchpad = 0x4E,
    ReadScratchpad = 0xBE,
    CopyScratchpad = 0x48,
    RecallE2 = 0xB8,
    ReadPowerSupply = 0xB4,
}

impl OpCode for Command {
    fn op_code(&self) -> u8 {
        *self as _
    }
}

/// Settle time after COPY_SCRATCHPAD, the datasheet asks for 10 ms
const EEPROM_WRITE_MS: u32 = 20;

/// Recall time of a parasite powered device, which cannot signal completion
const RECALL_PARASITE_MS: u32 = 10;

/// Polling budget for RECALL_EEPROM completion
const RECALL_TIMEOUT_MS: u32 = 20;

/// Lowest and highest alarm threshold the sensors can measure
const ALARM_MIN_C: i8 = -55;
const ALARM_MAX_C: i8 = 125;

/// Receives the devices found by [`DallasTemperature::process_alarms`]
pub trait AlarmHandler {
    fn on_alarm(&mut self, address: &Address);
}

impl<F: FnMut(&Address)> AlarmHandler for F {
    fn on_alarm(&mut self, address: &Address) {
        self(address)
    }
}

/// Temperature sensor session on one bus, remembering up to `N` devices
pub struct DallasTemperature<W: UartWire, const N: usize = 8> {
    driver: Driver<W>,
    config: SessionConfig,
    devices: heapless::Vec<Address, N>,
    ds18_count: usize,
    parasite: bool,
    bit_resolution: u8,
}

impl<E: Debug, W: UartWire<Error = E>, const N: usize> DallasTemperature<W, N> {
    pub fn new(wire: W) -> Self {
        Self::with_config(Driver::new(wire), SessionConfig::default())
    }

    pub fn with_config(driver: Driver<W>, config: SessionConfig) -> Self {
        DallasTemperature {
            driver,
            config,
            devices: heapless::Vec::new(),
            ds18_count: 0,
            parasite: false,
            bit_resolution: Resolution::Bits12.bits(),
        }
    }

    pub fn driver(&self) -> &Driver<W> {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut Driver<W> {
        &mut self.driver
    }

    pub fn into_driver(self) -> Driver<W> {
        self.driver
    }

    /// Enumerates the bus
    ///
    /// Every CRC-valid address is asked for its power supply. Those of a
    /// supported family also count as sensors and contribute to the global
    /// resolution, which stays at 12 bit if none of them reports one.
    /// Devices beyond the capacity `N` are ignored.
    pub fn begin(&mut self) -> Result<(), Error<E>> {
        self.driver.init()?;
        self.devices.clear();
        self.ds18_count = 0;
        self.parasite = false;

        self.driver.reset_search();
        while let Some(address) = self.driver.search()? {
            if self.devices.push(address).is_err() {
                warn!("begin: more than {} devices, ignoring {}", N, address);
                break;
            }
        }

        let devices = self.devices.clone();
        for address in devices.iter().filter(|a| a.is_valid()) {
            if !self.parasite {
                match self.read_power_supply(address) {
                    Ok(parasite) => self.parasite = parasite,
                    Err(e) => warn!("begin: power supply of {}: {:?}", address, e),
                }
            }

            if address.is_supported_family() {
                self.ds18_count += 1;
            } else {
                debug!("begin: {} is not a temperature sensor", address);
            }
        }
        self.recalculate_global_resolution(0);
        if self.bit_resolution == 0 {
            self.bit_resolution = Resolution::Bits12.bits();
        }

        debug!(
            "begin: {} devices, {} sensors, parasite {}, {} bit",
            self.devices.len(),
            self.ds18_count,
            self.parasite,
            self.bit_resolution
        );
        Ok(())
    }

    /// Number of devices found by [`DallasTemperature::begin`]
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Number of CRC-valid devices of a supported family
    pub fn ds18_count(&self) -> usize {
        self.ds18_count
    }

    pub fn devices(&self) -> &[Address] {
        &self.devices
    }

    pub fn valid_address(address: &Address) -> bool {
        address.is_valid()
    }

    pub fn valid_family(address: &Address) -> bool {
        address.is_supported_family()
    }

    /// Address of the device at `index`, if it passed its CRC check
    pub fn address(&self, index: usize) -> Option<Address> {
        self.devices.get(index).copied().filter(|a| a.is_valid())
    }

    fn address_or_disconnected(&self, index: usize) -> Result<Address, Error<E>> {
        self.address(index).ok_or(Error::Disconnected)
    }

    /// Reads the 9 scratchpad bytes without checking them
    pub fn read_scratchpad(&mut self, address: &Address) -> Result<Scratchpad, Error<E>> {
        let mut query = [0xFFu8; 10 + Scratchpad::BYTES];
        query[0] = crate::Command::MatchRom.op_code();
        query[1..9].copy_from_slice(address.as_ref());
        query[9] = Command::ReadScratchpad.op_code();

        let mut scratchpad = Scratchpad::default();
        self.driver
            .send(true, &query, scratchpad.as_mut(), Some(10))?;
        Ok(scratchpad)
    }

    /// Reads the scratchpad and checks its CRC
    ///
    /// A scratchpad of all ones means nobody answered the MATCH_ROM.
    pub fn connected_scratchpad(&mut self, address: &Address) -> Result<Scratchpad, Error<E>> {
        let scratchpad = self.read_scratchpad(address)?;
        if scratchpad.bytes().iter().all(|b| *b == 0xFF) {
            return Err(Error::Disconnected);
        }
        scratchpad.ensure_valid::<E>().map_err(|e| {
            warn!("scratchpad of {}: {}", address, e);
            e
        })?;
        Ok(scratchpad)
    }

    /// The device answers with a CRC-valid scratchpad
    pub fn is_connected(&mut self, address: &Address) -> bool {
        self.connected_scratchpad(address).is_ok()
    }

    /// Writes the alarm bytes and, where the family has one, the
    /// configuration register
    ///
    /// With auto save enabled the values are copied to EEPROM afterwards.
    pub fn write_scratchpad(
        &mut self,
        address: &Address,
        scratchpad: &Scratchpad,
        delay: &mut impl DelayNs,
    ) -> Result<(), Error<E>> {
        let bytes = scratchpad.bytes();
        let write = [
            Command::WriteScratchpad.op_code(),
            bytes[Scratchpad::HIGH_ALARM_TEMP],
            bytes[Scratchpad::LOW_ALARM_TEMP],
            bytes[Scratchpad::CONFIGURATION],
        ];
        let has_configuration = Family::from_code(address.family_code())
            .map_or(true, |family| family.has_configuration_register());
        let len = if has_configuration { 4 } else { 3 };
        self.driver.reset_select_write_only(address, &write[..len])?;

        if self.config.auto_save_scratchpad {
            self.save_scratchpad(address, delay)
        } else {
            self.driver.reset_presence()?;
            Ok(())
        }
    }

    /// Copies the alarm and configuration bytes to EEPROM
    pub fn save_scratchpad(
        &mut self,
        address: &Address,
        delay: &mut impl DelayNs,
    ) -> Result<(), Error<E>> {
        self.driver
            .reset_select_write_only(address, &[Command::CopyScratchpad.op_code()])?;
        self.strong_pullup_delay(delay, EEPROM_WRITE_MS)?;
        self.driver.reset_presence()?;
        Ok(())
    }

    /// Reloads the alarm and configuration bytes from EEPROM
    pub fn recall_scratchpad(
        &mut self,
        address: &Address,
        delay: &mut impl DelayNs,
    ) -> Result<(), Error<E>> {
        self.driver
            .reset_select_write_only(address, &[Command::RecallE2.op_code()])?;

        if self.parasite {
            delay.delay_ms(RECALL_PARASITE_MS);
            return Ok(());
        }
        for _ in 0..RECALL_TIMEOUT_MS {
            if self.driver.read_bit()? {
                return Ok(());
            }
            delay.delay_ms(1);
        }
        Err(Error::Timeout)
    }

    /// The device takes its power from the data line
    pub fn read_power_supply(&mut self, address: &Address) -> Result<bool, Error<E>> {
        self.driver
            .reset_select_write_only(address, &[Command::ReadPowerSupply.op_code()])?;
        let powered = self.driver.read_bit()?;
        self.driver.reset_presence()?;
        Ok(!powered)
    }

    pub fn is_parasite_power_mode(&self) -> bool {
        self.parasite
    }

    /// Resolution used to time broadcast conversions, the highest one
    /// found on the bus
    pub fn global_resolution(&self) -> u8 {
        self.bit_resolution
    }

    /// Resolution of one device, legacy parts are always 12 bit
    pub fn resolution(&mut self, address: &Address) -> Result<Resolution, Error<E>> {
        let family = address.family::<E>()?;
        if family.generation() == Generation::Legacy {
            return Ok(Resolution::Bits12);
        }
        self.connected_scratchpad(address)?
            .resolution(family.generation())
    }

    /// Sets the resolution of one device, `bits` is clamped to 9..=12
    ///
    /// The global resolution is raised right away. It is only lowered by a
    /// rescan of all devices, unless `skip_global_calculation` is set.
    pub fn set_resolution(
        &mut self,
        address: &Address,
        bits: u8,
        skip_global_calculation: bool,
        delay: &mut impl DelayNs,
    ) -> Result<(), Error<E>> {
        let resolution = Resolution::from_bits(bits);
        let family = address.family::<E>()?;
        if !family.has_configuration_register() {
            return Ok(());
        }
        if matches!(self.resolution(address), Ok(current) if current == resolution) {
            return Ok(());
        }

        let mut scratchpad = self.connected_scratchpad(address)?;
        scratchpad.set_resolution(resolution);
        self.write_scratchpad(address, &scratchpad, delay)?;
        debug!("{} set to {} bit", address, resolution.bits());

        self.bit_resolution = self.bit_resolution.max(resolution.bits());
        if !skip_global_calculation && self.bit_resolution > resolution.bits() {
            self.recalculate_global_resolution(resolution.bits());
        }
        Ok(())
    }

    /// Global resolution becomes the highest of `floor` and every readable
    /// sensor, legacy parts counting as 12 bit
    fn recalculate_global_resolution(&mut self, floor: u8) {
        self.bit_resolution = floor;
        let devices = self.devices.clone();
        for address in devices.iter().filter(|a| a.is_valid() && a.is_supported_family()) {
            match self.resolution(address) {
                Ok(resolution) => {
                    self.bit_resolution = self.bit_resolution.max(resolution.bits())
                }
                Err(e) => warn!("resolution of {}: {:?}", address, e),
            }
        }
    }

    /// Sets every known device to `bits`, clamped to 9..=12
    ///
    /// The global resolution ends up at the slowest device afterwards, so a
    /// legacy part or a device that refused the write keeps it higher.
    pub fn set_all_resolution(&mut self, bits: u8, delay: &mut impl DelayNs) {
        let resolution = Resolution::from_bits(bits);

        let devices = self.devices.clone();
        for address in devices.iter().filter(|a| a.is_valid() && a.is_supported_family()) {
            if let Err(e) = self.set_resolution(address, resolution.bits(), true, delay) {
                warn!("resolution of {}: {:?}", address, e);
            }
        }
        self.recalculate_global_resolution(resolution.bits());
    }

    pub fn wait_for_conversion(&self) -> bool {
        self.config.wait_for_conversion
    }

    /// `false` makes conversion requests return right away, the caller has
    /// to wait [`millis_to_wait_for_conversion`] before reading
    pub fn set_wait_for_conversion(&mut self, wait: bool) {
        self.config.wait_for_conversion = wait;
    }

    pub fn check_for_conversion(&self) -> bool {
        self.config.check_for_conversion
    }

    /// `true` polls the bus for the end of a conversion instead of waiting
    /// for the worst case time
    pub fn set_check_for_conversion(&mut self, check: bool) {
        self.config.check_for_conversion = check;
    }

    pub fn auto_save_scratchpad(&self) -> bool {
        self.config.auto_save_scratchpad
    }

    pub fn set_auto_save_scratchpad(&mut self, auto_save: bool) {
        self.config.auto_save_scratchpad = auto_save;
    }

    /// A device holds the read slot low while converting. Only meaningful
    /// with a single externally powered responder.
    pub fn is_conversion_complete(&mut self) -> Result<bool, Error<E>> {
        Ok(self.driver.read_bit()?)
    }

    /// Starts a conversion on every device
    pub fn request_temperatures(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        self.driver
            .reset_skip_write_only(&[Command::Convert.op_code()])?;

        if !self.config.wait_for_conversion {
            return Ok(());
        }
        self.block_till_conversion_complete(self.bit_resolution, delay)
    }

    /// Starts a conversion on one device, failing if it does not report
    /// its resolution
    pub fn request_temperatures_by_address(
        &mut self,
        address: &Address,
        delay: &mut impl DelayNs,
    ) -> Result<(), Error<E>> {
        let resolution = self.resolution(address)?;
        self.driver
            .reset_select_write_only(address, &[Command::Convert.op_code()])?;

        if !self.config.wait_for_conversion {
            return Ok(());
        }
        self.block_till_conversion_complete(resolution.bits(), delay)
    }

    pub fn request_temperatures_by_index(
        &mut self,
        index: usize,
        delay: &mut impl DelayNs,
    ) -> Result<(), Error<E>> {
        let address = self.address_or_disconnected(index)?;
        self.request_temperatures_by_address(&address, delay)
    }

    fn block_till_conversion_complete(
        &mut self,
        bits: u8,
        delay: &mut impl DelayNs,
    ) -> Result<(), Error<E>> {
        let millis = millis_to_wait_for_conversion(bits) as u32;
        if self.config.check_for_conversion && !self.parasite {
            for _ in 0..millis {
                if self.is_conversion_complete()? {
                    return Ok(());
                }
                delay.delay_ms(1);
            }
            debug!("conversion did not signal completion within {} ms", millis);
            Ok(())
        } else {
            self.strong_pullup_delay(delay, millis)
        }
    }

    /// Waits `millis` with the strong pull-up driven, if one is fitted
    fn strong_pullup_delay(&mut self, delay: &mut impl DelayNs, millis: u32) -> Result<(), Error<E>> {
        if !self.driver.has_strong_pullup() {
            delay.delay_ms(millis);
            return Ok(());
        }
        self.driver.set_strong_pullup(true)?;
        delay.delay_ms(millis);
        self.driver.set_strong_pullup(false)?;
        Ok(())
    }

    /// Temperature in 1/128 °C from a scratchpad of the given device
    pub fn calculate_temperature(address: &Address, scratchpad: &Scratchpad) -> i16 {
        let generation = Family::from_code(address.family_code())
            .map_or(Generation::Modern, Family::generation);
        scratchpad.raw_temperature(generation)
    }

    /// Temperature in 1/128 °C
    pub fn try_temp(&mut self, address: &Address) -> Result<i16, Error<E>> {
        let scratchpad = self.connected_scratchpad(address)?;
        Ok(Self::calculate_temperature(address, &scratchpad))
    }

    /// Temperature in 1/128 °C or [`DEVICE_DISCONNECTED_RAW`]
    pub fn temp(&mut self, address: &Address) -> i16 {
        self.try_temp(address).unwrap_or(DEVICE_DISCONNECTED_RAW)
    }

    /// Temperature in °C or [`DEVICE_DISCONNECTED_C`]
    pub fn temp_c(&mut self, address: &Address) -> f32 {
        raw_to_celsius(self.temp(address))
    }

    /// Temperature in °F or [`DEVICE_DISCONNECTED_F`]
    pub fn temp_f(&mut self, address: &Address) -> f32 {
        raw_to_fahrenheit(self.temp(address))
    }

    pub fn temp_c_by_index(&mut self, index: usize) -> f32 {
        match self.address(index) {
            Some(address) => self.temp_c(&address),
            None => DEVICE_DISCONNECTED_C,
        }
    }

    pub fn temp_f_by_index(&mut self, index: usize) -> f32 {
        match self.address(index) {
            Some(address) => self.temp_f(&address),
            None => DEVICE_DISCONNECTED_F,
        }
    }

    /// The alarm bytes read as a 16 bit value, 0 if the device is not
    /// connected. Only meaningful if the alarms are not used.
    pub fn user_data(&mut self, address: &Address) -> i16 {
        self.connected_scratchpad(address)
            .map(|scratchpad| scratchpad.user_data())
            .unwrap_or(0)
    }

    /// Stores `data` in the alarm bytes. Does nothing if the value is
    /// already stored or the device is not connected.
    pub fn set_user_data(
        &mut self,
        address: &Address,
        data: i16,
        delay: &mut impl DelayNs,
    ) -> Result<(), Error<E>> {
        let mut scratchpad = match self.connected_scratchpad(address) {
            Ok(scratchpad) => scratchpad,
            Err(Error::PortError(e)) => return Err(Error::PortError(e)),
            Err(e) => {
                debug!("user data of {} not written: {}", address, e);
                return Ok(());
            }
        };
        if scratchpad.user_data() == data {
            return Ok(());
        }
        scratchpad.set_user_data(data);
        self.write_scratchpad(address, &scratchpad, delay)
    }

    pub fn user_data_by_index(&mut self, index: usize) -> i16 {
        match self.address(index) {
            Some(address) => self.user_data(&address),
            None => 0,
        }
    }

    pub fn set_user_data_by_index(
        &mut self,
        index: usize,
        data: i16,
        delay: &mut impl DelayNs,
    ) -> Result<(), Error<E>> {
        match self.address(index) {
            Some(address) => self.set_user_data(&address, data, delay),
            None => Ok(()),
        }
    }

    pub fn high_alarm_temp(&mut self, address: &Address) -> Result<i8, Error<E>> {
        Ok(self.connected_scratchpad(address)?.high_alarm())
    }

    pub fn low_alarm_temp(&mut self, address: &Address) -> Result<i8, Error<E>> {
        Ok(self.connected_scratchpad(address)?.low_alarm())
    }

    /// Sets the upper alarm threshold, clamped to the measurable range.
    /// Overwrites user data.
    pub fn set_high_alarm_temp(
        &mut self,
        address: &Address,
        celsius: i8,
        delay: &mut impl DelayNs,
    ) -> Result<(), Error<E>> {
        let mut scratchpad = self.connected_scratchpad(address)?;
        scratchpad.set_high_alarm(celsius.clamp(ALARM_MIN_C, ALARM_MAX_C));
        self.write_scratchpad(address, &scratchpad, delay)
    }

    /// Sets the lower alarm threshold, clamped to the measurable range.
    /// Overwrites user data.
    pub fn set_low_alarm_temp(
        &mut self,
        address: &Address,
        celsius: i8,
        delay: &mut impl DelayNs,
    ) -> Result<(), Error<E>> {
        let mut scratchpad = self.connected_scratchpad(address)?;
        scratchpad.set_low_alarm(celsius.clamp(ALARM_MIN_C, ALARM_MAX_C));
        self.write_scratchpad(address, &scratchpad, delay)
    }

    /// The last conversion is at or outside one of the thresholds
    pub fn has_alarm(&mut self, address: &Address) -> Result<bool, Error<E>> {
        let scratchpad = self.connected_scratchpad(address)?;
        let celsius = raw_to_whole_celsius(Self::calculate_temperature(address, &scratchpad));
        Ok(celsius <= scratchpad.low_alarm() as i16 || celsius >= scratchpad.high_alarm() as i16)
    }

    /// Any device on the bus has its alarm flag raised
    pub fn has_any_alarm(&mut self) -> Result<bool, Error<E>> {
        self.driver.reset_alarm_search();
        let found = self.driver.alarm_search()?.is_some();
        self.driver.reset_alarm_search();
        Ok(found)
    }

    pub fn reset_alarm_search(&mut self) {
        self.driver.reset_alarm_search();
    }

    /// Next device with its alarm flag raised
    pub fn alarm_search(&mut self) -> Result<Option<Address>, Error<E>> {
        self.driver.alarm_search()
    }

    /// Runs a complete alarm search and hands every alarmed device to
    /// `handler`. Returns the number of alarmed devices.
    pub fn process_alarms(
        &mut self,
        mut handler: Option<&mut dyn AlarmHandler>,
    ) -> Result<usize, Error<E>> {
        self.driver.reset_alarm_search();
        let mut count = 0;
        while let Some(address) = self.driver.alarm_search()? {
            if let Some(handler) = handler.as_mut() {
                handler.on_alarm(&address);
            }
            count += 1;
        }
        Ok(count)
    }
}
