use byteorder::{ByteOrder, LittleEndian};

use crate::{compute_partial_crc8, OpCode};

pub const FAMILY_CODE: u8 = 0x28;

/// Length of the scratchpad including its trailing CRC-8
pub const SCRATCHPAD_BYTES: usize = 9;

/// Temperature register at the start of the scratchpad
pub const TEMPERATURE_BYTES: usize = 2;

/// Lowest temperature the sensor can measure, in °C
pub const MIN_CELSIUS: f32 = -55.0;

/// Highest temperature the sensor can measure, in °C
pub const MAX_CELSIUS: f32 = 125.0;

/// What a read returns when no device drives the line
pub const FLOATING_BUS: u16 = 0xFFFF;

/// Worst case conversion time at the power-on 12-bit resolution
pub const CONVERSION_TIME_MS: u32 = 750;

/// Function commands, sent after a ROM command
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    Convert = 0x44,
    ReadScratchpad = 0xBE,
}

impl OpCode for Command {
    fn op_code(&self) -> u8 {
        *self as _
    }
}

/// Converts the two's complement 1/16 °C register value to °C
pub fn raw_to_celsius(raw: u16) -> f32 {
    raw as i16 as f32 / 16_f32
}

pub fn celsius_to_fahrenheit(celsius: f32) -> f32 {
    celsius * 9_f32 / 5_f32 + 32_f32
}

pub fn temperature_from_scratchpad(scratchpad: &[u8]) -> u16 {
    LittleEndian::read_u16(&scratchpad[0..TEMPERATURE_BYTES])
}

/// Returns the computed and the received CRC-8 if they differ
pub fn check_scratchpad(scratchpad: &[u8; SCRATCHPAD_BYTES]) -> Result<(), (u8, u8)> {
    let computed = compute_partial_crc8(0, &scratchpad[..SCRATCHPAD_BYTES - 1]);
    let received = scratchpad[SCRATCHPAD_BYTES - 1];
    if computed != received {
        Err((computed, received))
    } else {
        Ok(())
    }
}
