#![cfg_attr(not(test), no_std)]
#![doc = include_str!("../README.md")]

mod address;
pub mod codec;
mod command;
mod config;
pub mod crc;
#[cfg(feature = "dallas")]
pub mod dallas;
mod driver;
mod family;
mod result;
mod scratchpad;
mod search;
#[cfg(test)]
mod sim;
pub mod temperature;
mod uart;

pub use address::{Address, AddressError};
pub use command::{Command, OpCode};
pub use config::BusConfig;
#[cfg(feature = "dallas")]
pub use config::SessionConfig;
pub use crc::{check_crc16, compute_partial_crc8, crc16, crc8, ensure_crc8};
#[cfg(feature = "dallas")]
pub use dallas::{AlarmHandler, DallasTemperature};
pub use driver::Driver;
pub use family::{Family, Generation};
pub use result::Error;
pub use scratchpad::{millis_to_wait_for_conversion, Resolution, Scratchpad};
pub use search::{DeviceSearch, DeviceSearchIter};
pub use uart::{PullupError, UartWire, WithPullup};
