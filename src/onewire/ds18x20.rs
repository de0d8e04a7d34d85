//! DS18x20 temperature sensor operations on top of [`OneWireBus`].
//!
//! Handles both the DS18B20/DS1822 (family 0x28/0x22) 12-bit format and the
//! older DS18S20 (family 0x10) 9-bit format with the extended-resolution
//! correction from its datasheet.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embassy_time::Timer;
use heapless::Vec;

use crate::error::SensorError;
use crate::onewire::{crc8, OneWireBus, SearchState, SensorAddress};
use crate::report::{TemperatureSource, MAX_SENSORS};

const MATCH_ROM: u8 = 0x55;
const SKIP_ROM: u8 = 0xCC;
const CONVERT_T: u8 = 0x44;
const READ_SCRATCHPAD: u8 = 0xBE;

pub const FAMILY_DS18S20: u8 = 0x10;

/// Worst-case 12-bit conversion time.
const CONVERSION_DELAY_MS: u64 = 750;

pub struct Ds18x20<P, D> {
    bus: OneWireBus<P, D>,
}

impl<P, D> Ds18x20<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    pub fn new(bus: OneWireBus<P, D>) -> Self {
        Self { bus }
    }

    /// Enumerates the sensors currently answering on the bus.
    pub fn scan(&mut self) -> Result<Vec<SensorAddress, MAX_SENSORS>, SensorError> {
        let mut found = Vec::new();
        let mut state = SearchState::new();
        while let Some(address) = self.bus.search_next(&mut state)? {
            found.push(address).map_err(|_| SensorError::BufferOverflow)?;
        }
        if found.is_empty() {
            return Err(SensorError::NoDevices);
        }
        Ok(found)
    }

    fn read_scratchpad(&mut self, address: &SensorAddress) -> Result<[u8; 9], SensorError> {
        self.bus.reset()?;
        self.bus.write_byte(MATCH_ROM)?;
        for byte in address.0 {
            self.bus.write_byte(byte)?;
        }
        self.bus.write_byte(READ_SCRATCHPAD)?;
        let mut scratchpad = [0u8; 9];
        for byte in scratchpad.iter_mut() {
            *byte = self.bus.read_byte()?;
        }
        if crc8(&scratchpad) != 0 {
            return Err(SensorError::CrcMismatch);
        }
        Ok(scratchpad)
    }
}

impl<P, D> TemperatureSource for Ds18x20<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    /// Broadcasts CONVERT T to every sensor and waits out the conversion.
    async fn start_conversion(&mut self) -> Result<(), SensorError> {
        self.bus.reset()?;
        self.bus.write_byte(SKIP_ROM)?;
        self.bus.write_byte(CONVERT_T)?;
        Timer::after_millis(CONVERSION_DELAY_MS).await;
        Ok(())
    }

    async fn read_temperature(&mut self, address: &SensorAddress) -> Result<f32, SensorError> {
        let scratchpad = self.read_scratchpad(address)?;
        Ok(decode_temperature(address.family(), &scratchpad))
    }
}

/// Converts a scratchpad into degrees Celsius for the given family.
pub fn decode_temperature(family: u8, scratchpad: &[u8; 9]) -> f32 {
    if family == FAMILY_DS18S20 {
        // 9-bit reading in half degrees, refined with the count registers.
        let raw = i16::from_le_bytes([scratchpad[0], scratchpad[1]]);
        let truncated = (raw >> 1) as f32;
        let count_remain = scratchpad[6] as f32;
        let count_per_c = scratchpad[7] as f32;
        truncated - 0.25 + (count_per_c - count_remain) / count_per_c
    } else {
        let raw = i16::from_le_bytes([scratchpad[0], scratchpad[1]]);
        raw as f32 / 16.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_positive_12bit_reading() {
        // Datasheet example: 0x0191 = +25.0625 C.
        let scratchpad = [0x91, 0x01, 0x4B, 0x46, 0x7F, 0xFF, 0x0F, 0x10, 0x25];
        assert_eq!(crc8(&scratchpad), 0);
        assert_eq!(decode_temperature(0x28, &scratchpad), 25.0625);
    }

    #[test]
    fn decodes_negative_12bit_reading() {
        // 0xFF5E = -10.125 C.
        let scratchpad = [0x5E, 0xFF, 0x4B, 0x46, 0x7F, 0xFF, 0x02, 0x10, 0xB6];
        assert_eq!(crc8(&scratchpad), 0);
        assert_eq!(decode_temperature(0x28, &scratchpad), -10.125);
    }

    #[test]
    fn decodes_power_on_reset_value() {
        let scratchpad = [0x50, 0x05, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10, 0x1C];
        assert_eq!(decode_temperature(0x28, &scratchpad), 85.0);
    }

    #[test]
    fn decodes_ds18s20_with_count_correction() {
        // 0x0032 >> 1 = 25, corrected: 25 - 0.25 + (16 - 12) / 16 = 25.0.
        let scratchpad = [0x32, 0x00, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10, 0xB2];
        assert_eq!(crc8(&scratchpad), 0);
        assert_eq!(decode_temperature(FAMILY_DS18S20, &scratchpad), 25.0);
    }
}
