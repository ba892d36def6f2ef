//! Fixed point temperatures and unit conversions.
//!
//! Raw temperatures are signed 1/128 °C steps, independent of the resolution
//! the device was configured with.

/// Raw value reported for a device that could not be read
pub const DEVICE_DISCONNECTED_RAW: i16 = -7040;

/// Celsius value reported for a device that could not be read
pub const DEVICE_DISCONNECTED_C: f32 = -127.0;

/// Fahrenheit value reported for a device that could not be read
pub const DEVICE_DISCONNECTED_F: f32 = -196.6;

/// Raw steps per degree Celsius
pub const RAW_PER_DEGREE: i16 = 128;

pub fn raw_to_celsius(raw: i16) -> f32 {
    if raw <= DEVICE_DISCONNECTED_RAW {
        return DEVICE_DISCONNECTED_C;
    }
    raw as f32 / RAW_PER_DEGREE as f32
}

/// `raw * 0.0140625 + 32`, computed as `raw * 9 / 640 + 32`
pub fn raw_to_fahrenheit(raw: i16) -> f32 {
    if raw <= DEVICE_DISCONNECTED_RAW {
        return DEVICE_DISCONNECTED_F;
    }
    raw as f32 * 9.0 / 640.0 + 32.0
}

pub fn to_fahrenheit(celsius: f32) -> f32 {
    celsius * 1.8 + 32.0
}

pub fn to_celsius(fahrenheit: f32) -> f32 {
    (fahrenheit - 32.0) * 0.555_555_56
}

/// Whole degrees of a raw value, rounded towards negative infinity
pub fn raw_to_whole_celsius(raw: i16) -> i16 {
    raw >> 7
}
