//! Bit-banged one-wire master over a single open-drain GPIO.
//!
//! The pin must be configured open-drain with a pull-up: driving low pulls
//! the bus down, driving high releases it. Slot timing follows the standard
//! speed figures from the DS18B20 datasheet.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::error::SensorError;

pub mod ds18x20;

/// 64-bit ROM code identifying one device on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub struct SensorAddress(pub [u8; 8]);

impl SensorAddress {
    /// Device family code (first ROM byte).
    pub fn family(&self) -> u8 {
        self.0[0]
    }
}

/// Dallas CRC-8 (poly 0x31 reflected) as used for ROM codes and scratchpads.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        let mut byte = byte;
        for _ in 0..8 {
            let mix = (crc ^ byte) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            byte >>= 1;
        }
    }
    crc
}

pub struct OneWireBus<P, D> {
    pin: P,
    delay: D,
}

impl<P, D> OneWireBus<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    pub fn new(pin: P, delay: D) -> Self {
        Self { pin, delay }
    }

    /// Issues a reset pulse. Ok(()) means at least one device answered with
    /// a presence pulse.
    pub fn reset(&mut self) -> Result<(), SensorError> {
        self.pin.set_low().map_err(|_| SensorError::Gpio)?;
        self.delay.delay_us(480);
        self.pin.set_high().map_err(|_| SensorError::Gpio)?;
        self.delay.delay_us(70);
        let present = self.pin.is_low().map_err(|_| SensorError::Gpio)?;
        self.delay.delay_us(410);
        if present {
            Ok(())
        } else {
            Err(SensorError::NoDevices)
        }
    }

    pub fn write_bit(&mut self, bit: bool) -> Result<(), SensorError> {
        self.pin.set_low().map_err(|_| SensorError::Gpio)?;
        if bit {
            self.delay.delay_us(6);
            self.pin.set_high().map_err(|_| SensorError::Gpio)?;
            self.delay.delay_us(64);
        } else {
            self.delay.delay_us(60);
            self.pin.set_high().map_err(|_| SensorError::Gpio)?;
            self.delay.delay_us(10);
        }
        Ok(())
    }

    pub fn read_bit(&mut self) -> Result<bool, SensorError> {
        self.pin.set_low().map_err(|_| SensorError::Gpio)?;
        self.delay.delay_us(3);
        self.pin.set_high().map_err(|_| SensorError::Gpio)?;
        self.delay.delay_us(10);
        let bit = self.pin.is_high().map_err(|_| SensorError::Gpio)?;
        self.delay.delay_us(53);
        Ok(bit)
    }

    /// Writes a byte, LSB first.
    pub fn write_byte(&mut self, byte: u8) -> Result<(), SensorError> {
        for i in 0..8 {
            self.write_bit(byte & (1 << i) != 0)?;
        }
        Ok(())
    }

    pub fn read_byte(&mut self) -> Result<u8, SensorError> {
        let mut byte = 0u8;
        for i in 0..8 {
            if self.read_bit()? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }

    /// Advances a ROM search by one device. Returns None once the bus is
    /// exhausted.
    pub fn search_next(
        &mut self,
        state: &mut SearchState,
    ) -> Result<Option<SensorAddress>, SensorError> {
        const SEARCH_ROM: u8 = 0xF0;

        if state.last_device {
            return Ok(None);
        }
        self.reset()?;
        self.write_byte(SEARCH_ROM)?;

        let mut rom = state.rom;
        let mut last_zero = 0u8;
        for bit_number in 1..=64u8 {
            let id_bit = self.read_bit()?;
            let complement = self.read_bit()?;
            let direction = match state.choose_direction(bit_number, id_bit, complement, last_zero)
            {
                Some((dir, zero)) => {
                    last_zero = zero;
                    dir
                }
                // Both bits read 1: no device participates any more.
                None => return Ok(None),
            };
            let index = ((bit_number - 1) / 8) as usize;
            let mask = 1u8 << ((bit_number - 1) % 8);
            if direction {
                rom[index] |= mask;
            } else {
                rom[index] &= !mask;
            }
            self.write_bit(direction)?;
        }

        state.rom = rom;
        state.last_discrepancy = last_zero;
        if last_zero == 0 {
            state.last_device = true;
        }
        if crc8(&rom) != 0 {
            return Err(SensorError::CrcMismatch);
        }
        Ok(Some(SensorAddress(rom)))
    }
}

/// Bookkeeping for the Maxim ROM search (application note 187).
#[derive(Default)]
pub struct SearchState {
    rom: [u8; 8],
    last_discrepancy: u8,
    last_device: bool,
}

impl SearchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Picks the branch to follow at `bit_number` given the bit and its
    /// complement as read from the bus. Returns the chosen direction plus the
    /// updated position of the last zero-branch taken, or None when no device
    /// responded.
    fn choose_direction(
        &self,
        bit_number: u8,
        id_bit: bool,
        complement: bool,
        last_zero: u8,
    ) -> Option<(bool, u8)> {
        match (id_bit, complement) {
            (true, true) => None,
            // All participating devices agree on this bit.
            (bit, cmp) if bit != cmp => Some((bit, last_zero)),
            // Discrepancy: retrace the previous path up to the fork, take the
            // one-branch at the fork itself, explore zero-branches beyond it.
            _ => {
                let direction = if bit_number == self.last_discrepancy {
                    true
                } else if bit_number > self.last_discrepancy {
                    false
                } else {
                    let index = ((bit_number - 1) / 8) as usize;
                    self.rom[index] & (1 << ((bit_number - 1) % 8)) != 0
                };
                let last_zero = if !direction { bit_number } else { last_zero };
                Some((direction, last_zero))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc8_accepts_valid_rom_codes() {
        // CRC byte computed over the first seven bytes.
        let rom = [0x28, 0xA5, 0x4D, 0xCA, 0x18, 0x25, 0x30, 0x61];
        assert_eq!(crc8(&rom[..7]), rom[7]);
        assert_eq!(crc8(&rom), 0);
    }

    #[test]
    fn crc8_rejects_corrupted_rom_codes() {
        let mut rom = [0x28, 0xBB, 0x1D, 0x6D, 0x13, 0x2C, 0xDE, 0x16];
        assert_eq!(crc8(&rom), 0);
        rom[3] ^= 0x40;
        assert_ne!(crc8(&rom), 0);
    }

    #[test]
    fn search_retraces_previous_path_before_the_fork() {
        // Previous pass ended with a fork at bit 3 after taking the
        // zero-branch; the next pass must replay stored bits below the fork,
        // take the one-branch at it, and zero-branch past it.
        let state = SearchState {
            rom: [0b0000_0101, 0, 0, 0, 0, 0, 0, 0],
            last_discrepancy: 3,
            last_device: false,
        };
        assert_eq!(state.choose_direction(1, false, false, 0), Some((true, 0)));
        assert_eq!(state.choose_direction(2, false, false, 0), Some((false, 2)));
        assert_eq!(state.choose_direction(3, false, false, 2), Some((true, 2)));
        assert_eq!(state.choose_direction(4, false, false, 2), Some((false, 4)));
    }

    #[test]
    fn search_follows_agreed_bits_and_stops_on_empty_slot() {
        let state = SearchState::new();
        assert_eq!(state.choose_direction(1, true, false, 0), Some((true, 0)));
        assert_eq!(state.choose_direction(2, false, true, 0), Some((false, 0)));
        assert_eq!(state.choose_direction(3, true, true, 0), None);
    }
}
