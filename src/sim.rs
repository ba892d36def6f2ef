//! Simulated UART 1-Wire bus with DS18xxx devices, for tests only.

use crate::codec::{SYMBOL_ONE, SYMBOL_ZERO};
use crate::crc::crc8;
use crate::{Address, BusConfig, UartWire};
use core::cell::RefCell;
use embedded_hal::delay::DelayNs;
use std::rc::Rc;
use std::vec::Vec;

/// What a slot echo looks like when a device stretched the low phase
const SYMBOL_PULLED: u8 = 0xFC;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Reset,
    Function(u8),
    Pullup(bool),
    DelayMs(u32),
}

pub type EventLog = Rc<RefCell<Vec<Event>>>;

#[derive(Debug, Clone)]
pub struct SimDevice {
    rom: [u8; 8],
    scratchpad: [u8; 9],
    eeprom: [u8; 3],
    parasite: bool,
    converted_temp: Option<u16>,
    conversion_slots: u32,
    busy: u32,
    corrupt_crc: bool,
    search_dropout: Option<usize>,
    recall_stuck: bool,
    selected: bool,
    searching: bool,
}

impl SimDevice {
    pub fn new(family: u8, serial: u64) -> Self {
        let mut rom = [0u8; 8];
        rom[0] = family;
        rom[1..7].copy_from_slice(&serial.to_le_bytes()[..6]);
        rom[7] = crc8(&rom[..7]);

        let scratchpad = if family == 0x10 {
            // 85 C power-on value of the 9-bit register
            [0xAA, 0x00, 0x4B, 0x46, 0xFF, 0xFF, 0x0C, 0x10, 0]
        } else {
            [0x50, 0x05, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10, 0]
        };
        let mut device = SimDevice {
            rom,
            scratchpad,
            eeprom: [scratchpad[2], scratchpad[3], scratchpad[4]],
            parasite: false,
            converted_temp: None,
            conversion_slots: 3,
            busy: 0,
            corrupt_crc: false,
            search_dropout: None,
            recall_stuck: false,
            selected: false,
            searching: false,
        };
        device.update_crc();
        device
    }

    pub fn ds18b20(serial: u64) -> Self {
        Self::new(0x28, serial)
    }

    pub fn ds18s20(serial: u64) -> Self {
        Self::new(0x10, serial)
    }

    pub fn address(&self) -> Address {
        Address::from(self.rom)
    }

    pub fn scratchpad(&self) -> [u8; 9] {
        self.scratchpad
    }

    pub fn eeprom(&self) -> [u8; 3] {
        self.eeprom
    }

    pub fn with_scratchpad_temp(mut self, raw: u16) -> Self {
        self.scratchpad[0..2].copy_from_slice(&raw.to_le_bytes());
        self.update_crc();
        self
    }

    pub fn with_counts(mut self, count_remain: u8, count_per_c: u8) -> Self {
        self.scratchpad[6] = count_remain;
        self.scratchpad[7] = count_per_c;
        self.update_crc();
        self
    }

    pub fn with_config(mut self, config: u8) -> Self {
        self.scratchpad[4] = config;
        self.eeprom[2] = config;
        self.update_crc();
        self
    }

    pub fn with_alarms(mut self, high: u8, low: u8) -> Self {
        self.scratchpad[2] = high;
        self.scratchpad[3] = low;
        self.update_crc();
        self
    }

    /// Register value loaded by the next conversion
    pub fn converting_to(mut self, raw: u16) -> Self {
        self.converted_temp = Some(raw);
        self
    }

    pub fn parasite(mut self) -> Self {
        self.parasite = true;
        self
    }

    pub fn with_bad_crc(mut self) -> Self {
        self.corrupt_crc = true;
        self
    }

    /// Stops answering search slots from ROM bit `bit` on
    pub fn drops_out_at(mut self, bit: usize) -> Self {
        self.search_dropout = Some(bit);
        self
    }

    /// Never reports the end of RECALL_EEPROM
    pub fn recall_stuck(mut self) -> Self {
        self.recall_stuck = true;
        self
    }

    fn answers_search(&self, bit: usize) -> bool {
        self.searching && self.search_dropout.map_or(true, |dropout| bit < dropout)
    }

    fn is_legacy(&self) -> bool {
        self.rom[0] == 0x10
    }

    fn update_crc(&mut self) {
        self.scratchpad[8] = crc8(&self.scratchpad[..8]);
    }

    fn rom_bit(&self, bit: usize) -> bool {
        self.rom[bit / 8] & (1 << (bit % 8)) != 0
    }

    fn scratchpad_bit(&self, bit: usize) -> bool {
        if bit >= 72 {
            return true;
        }
        let mut byte = self.scratchpad[bit / 8];
        if bit / 8 == 8 && self.corrupt_crc {
            byte ^= 0x5A;
        }
        byte & (1 << (bit % 8)) != 0
    }

    fn alarmed(&self) -> bool {
        let raw = i16::from_le_bytes([self.scratchpad[0], self.scratchpad[1]]);
        let whole = if self.is_legacy() { raw >> 1 } else { raw >> 4 };
        let high = self.scratchpad[2] as i8 as i16;
        let low = self.scratchpad[3] as i8 as i16;
        whole >= high || whole <= low
    }

    fn write_len(&self) -> usize {
        if self.is_legacy() {
            2
        } else {
            3
        }
    }

    fn write_scratchpad_byte(&mut self, index: usize, byte: u8) {
        if index >= self.write_len() {
            return;
        }
        self.scratchpad[2 + index] = if index == 2 {
            (byte & 0x60) | 0x1F
        } else {
            byte
        };
        self.update_crc();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Convert,
    Recall,
    PowerSupply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    RomCommand,
    Match,
    Search { bit: usize, step: u8 },
    Function,
    ReadScratchpad { bit: usize },
    WriteScratchpad,
    Status(Status),
}

pub struct SimBus {
    devices: Vec<SimDevice>,
    config: BusConfig,
    baud: u32,
    baud_history: Vec<u32>,
    pullup: bool,
    phase: Phase,
    shift: u8,
    shift_bits: u8,
    received: Vec<u8>,
    events: EventLog,
    fault_in: Option<usize>,
}

/// Transfer error injected by [`SimBus::fail_after`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimFault;

impl SimBus {
    pub fn new(devices: &[SimDevice]) -> Self {
        let config = BusConfig::default();
        SimBus {
            devices: devices.to_vec(),
            config,
            baud: config.data_baud,
            baud_history: Vec::new(),
            pullup: false,
            phase: Phase::Idle,
            shift: 0,
            shift_bits: 0,
            received: Vec::new(),
            events: Rc::new(RefCell::new(Vec::new())),
            fault_in: None,
        }
    }

    pub fn with_pullup(mut self) -> Self {
        self.pullup = true;
        self
    }

    /// Lets `transfers` more transfers through, then fails every one
    pub fn fail_after(&mut self, transfers: usize) {
        self.fault_in = Some(transfers);
    }

    pub fn events(&self) -> EventLog {
        self.events.clone()
    }

    pub fn baud_history(&self) -> &[u32] {
        &self.baud_history
    }

    pub fn device(&self, index: usize) -> &SimDevice {
        &self.devices[index]
    }

    pub fn unplug(&mut self, index: usize) -> SimDevice {
        self.devices.remove(index)
    }

    fn log(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    fn reset(&mut self) -> bool {
        self.log(Event::Reset);
        self.phase = Phase::RomCommand;
        self.shift = 0;
        self.shift_bits = 0;
        self.received.clear();
        for device in self.devices.iter_mut() {
            device.selected = false;
            device.searching = false;
        }
        !self.devices.is_empty()
    }

    /// Line level after one slot opened by the master with `master`
    fn slot(&mut self, master: bool) -> bool {
        match self.phase {
            Phase::Search { bit, step } if step < 2 => {
                let line = self
                    .devices
                    .iter()
                    .filter(|d| d.answers_search(bit))
                    .all(|d| d.rom_bit(bit) != (step == 1));
                self.phase = Phase::Search {
                    bit,
                    step: step + 1,
                };
                master && line
            }
            Phase::Search { bit, .. } => {
                for device in self.devices.iter_mut().filter(|d| d.searching) {
                    if device.rom_bit(bit) != master {
                        device.searching = false;
                    }
                }
                self.phase = if bit == 63 {
                    Phase::Idle
                } else {
                    Phase::Search {
                        bit: bit + 1,
                        step: 0,
                    }
                };
                master
            }
            Phase::ReadScratchpad { bit } => {
                let line = self
                    .devices
                    .iter()
                    .filter(|d| d.selected)
                    .all(|d| d.scratchpad_bit(bit));
                self.phase = Phase::ReadScratchpad { bit: bit + 1 };
                master && line
            }
            Phase::Status(status) => {
                let mut line = true;
                for device in self.devices.iter_mut().filter(|d| d.selected) {
                    let bit = match status {
                        Status::Convert => {
                            if device.busy > 0 {
                                device.busy -= 1;
                                false
                            } else {
                                true
                            }
                        }
                        Status::Recall => !device.recall_stuck,
                        Status::PowerSupply => !device.parasite,
                    };
                    line &= bit;
                }
                master && line
            }
            _ => {
                self.shift >>= 1;
                if master {
                    self.shift |= 0x80;
                }
                self.shift_bits += 1;
                if self.shift_bits == 8 {
                    let byte = self.shift;
                    self.shift = 0;
                    self.shift_bits = 0;
                    self.on_byte(byte);
                }
                master
            }
        }
    }

    fn on_byte(&mut self, byte: u8) {
        match self.phase {
            Phase::RomCommand => match byte {
                0xF0 | 0xEC => {
                    for device in self.devices.iter_mut() {
                        device.searching = byte == 0xF0 || device.alarmed();
                    }
                    self.phase = Phase::Search { bit: 0, step: 0 };
                }
                0x55 => {
                    self.received.clear();
                    self.phase = Phase::Match;
                }
                0xCC => {
                    for device in self.devices.iter_mut() {
                        device.selected = true;
                    }
                    self.phase = Phase::Function;
                }
                _ => self.phase = Phase::Idle,
            },
            Phase::Match => {
                self.received.push(byte);
                if self.received.len() == 8 {
                    let rom = self.received.clone();
                    for device in self.devices.iter_mut() {
                        device.selected = device.rom[..] == rom[..];
                    }
                    self.received.clear();
                    self.phase = Phase::Function;
                }
            }
            Phase::Function => {
                self.log(Event::Function(byte));
                self.phase = match byte {
                    0xBE => Phase::ReadScratchpad { bit: 0 },
                    0x4E => Phase::WriteScratchpad,
                    0x48 => {
                        for device in self.devices.iter_mut().filter(|d| d.selected) {
                            device.eeprom.copy_from_slice(&device.scratchpad[2..5]);
                        }
                        Phase::Idle
                    }
                    0x44 => {
                        for device in self.devices.iter_mut().filter(|d| d.selected) {
                            if let Some(raw) = device.converted_temp {
                                device.scratchpad[0..2].copy_from_slice(&raw.to_le_bytes());
                                device.update_crc();
                            }
                            device.busy = device.conversion_slots;
                        }
                        Phase::Status(Status::Convert)
                    }
                    0xB8 => {
                        for device in self.devices.iter_mut().filter(|d| d.selected) {
                            let eeprom = device.eeprom;
                            device.scratchpad[2..5].copy_from_slice(&eeprom);
                            device.update_crc();
                        }
                        Phase::Status(Status::Recall)
                    }
                    0xB4 => Phase::Status(Status::PowerSupply),
                    _ => Phase::Idle,
                };
            }
            Phase::WriteScratchpad => {
                let index = self.received.len();
                self.received.push(byte);
                for device in self.devices.iter_mut().filter(|d| d.selected) {
                    device.write_scratchpad_byte(index, byte);
                }
            }
            _ => {}
        }
    }
}

impl UartWire for SimBus {
    type Error = SimFault;

    fn set_baud_rate(&mut self, baud: u32) -> Result<(), Self::Error> {
        self.baud = baud;
        self.baud_history.push(baud);
        Ok(())
    }

    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), Self::Error> {
        assert_eq!(tx.len(), rx.len());
        match self.fault_in {
            Some(0) => return Err(SimFault),
            Some(left) => self.fault_in = Some(left - 1),
            None => {}
        }
        for (sent, echo) in tx.iter().zip(rx.iter_mut()) {
            if self.baud == self.config.reset_baud {
                assert_eq!(*sent, BusConfig::RESET_PATTERN);
                *echo = if self.reset() { 0xE0 } else { *sent };
            } else {
                assert_eq!(self.baud, self.config.data_baud);
                let master = *sent == SYMBOL_ONE;
                *echo = match (master, self.slot(master)) {
                    (true, true) => SYMBOL_ONE,
                    (true, false) => SYMBOL_PULLED,
                    (false, _) => SYMBOL_ZERO,
                };
            }
        }
        Ok(())
    }

    fn has_strong_pullup(&self) -> bool {
        self.pullup
    }

    fn set_strong_pullup(&mut self, active: bool) -> Result<(), Self::Error> {
        self.log(Event::Pullup(active));
        Ok(())
    }
}

/// Delay that only records what was asked of it
pub struct SimDelay {
    events: EventLog,
    pub total_ns: u64,
}

impl SimDelay {
    pub fn new(events: EventLog) -> Self {
        SimDelay {
            events,
            total_ns: 0,
        }
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += ns as u64;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ns += ms as u64 * 1_000_000;
        let mut events = self.events.borrow_mut();
        match events.last_mut() {
            Some(Event::DelayMs(total)) => *total += ms,
            _ => events.push(Event::DelayMs(ms)),
        }
    }
}
