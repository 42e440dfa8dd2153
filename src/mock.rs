//! Simulated bus, time and sink for the unit tests

use std::cell::Cell;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};

use crate::ds18b20::{self, SCRATCHPAD_BYTES};
use crate::report::{Diagnostic, Report, Sink};
use crate::schedule::{Clock, Instant};
use crate::{compute_partial_crc8, Address, Command, OneWire, OpCode};

/// Builds a ROM code with a valid CRC
pub fn rom(family: u8, serial: [u8; 6]) -> Address {
    let mut raw = [0u8; Address::BYTES as usize];
    raw[0] = family;
    raw[1..7].copy_from_slice(&serial);
    raw[7] = compute_partial_crc8(0, &raw[..7]);
    Address::from(raw)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError;

/// Bus traffic as seen by the devices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Reset,
    Write(u8),
    WriteBit(bool),
    ReadBit,
    ReadByte,
}

struct MockDevice {
    address: Address,
    raw: u16,
    alarmed: bool,
    corrupt: bool,
}

impl MockDevice {
    fn scratchpad(&self) -> [u8; SCRATCHPAD_BYTES] {
        let [lsb, msb] = self.raw.to_le_bytes();
        let mut scratchpad = [lsb, msb, 0x4b, 0x46, 0x7f, 0xff, 0x0c, 0x10, 0x00];
        scratchpad[8] = compute_partial_crc8(0, &scratchpad[..8]);
        if self.corrupt {
            scratchpad[8] ^= 0xff;
        }
        scratchpad
    }
}

enum Phase {
    Idle,
    Rom,
    Search { bit: u8, step: u8, active: Vec<bool> },
    Match(Vec<u8>),
    Selected(Option<usize>),
    Converting(u32),
    Scratchpad { data: [u8; SCRATCHPAD_BYTES], bit: usize },
}

/// A handful of DS18B20s on a wired-AND bus
pub struct MockBus {
    devices: Vec<MockDevice>,
    ops: Vec<Op>,
    phase: Phase,
    conversion_polls: u32,
    fail_after: Option<usize>,
}

impl MockBus {
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
            ops: Vec::new(),
            phase: Phase::Idle,
            conversion_polls: 3,
            fail_after: None,
        }
    }

    pub fn with_sensor(mut self, address: Address, raw: u16) -> Self {
        self.devices.push(MockDevice {
            address,
            raw,
            alarmed: false,
            corrupt: false,
        });
        self
    }

    fn device(&mut self, address: Address) -> &mut MockDevice {
        self.devices
            .iter_mut()
            .find(|device| device.address == address)
            .unwrap()
    }

    pub fn set_raw(&mut self, address: Address, raw: u16) {
        self.device(address).raw = raw;
    }

    pub fn set_alarm(&mut self, address: Address, alarmed: bool) {
        self.device(address).alarmed = alarmed;
    }

    pub fn corrupt_scratchpad(&mut self, address: Address) {
        self.device(address).corrupt = true;
    }

    /// Completion polls answered with 0 before the conversion reports done
    pub fn set_conversion_polls(&mut self, polls: u32) {
        self.conversion_polls = polls;
    }

    /// Every operation after the first `ops` ones fails
    pub fn fail_after(&mut self, ops: usize) {
        self.fail_after = Some(self.ops.len() + ops);
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.fail_after = self.fail_after.map(|limit| limit.saturating_sub(self.ops.len()));
        self.ops.clear();
    }

    fn log(&mut self, op: Op) -> Result<(), MockError> {
        if self.fail_after.is_some_and(|limit| self.ops.len() >= limit) {
            return Err(MockError);
        }
        self.ops.push(op);
        Ok(())
    }

    fn next_bit(&mut self) -> bool {
        let devices = &self.devices;
        match &mut self.phase {
            Phase::Converting(remaining) => {
                if *remaining == 0 {
                    true
                } else {
                    *remaining -= 1;
                    false
                }
            }
            Phase::Search { bit, step, active } if *step < 2 => {
                let wanted = *step == 1;
                *step += 1;
                // the line stays high only if every participant sends a 1
                devices
                    .iter()
                    .zip(active.iter())
                    .filter(|(_, active)| **active)
                    .all(|(device, _)| device.address.is_bit_set(*bit) != wanted)
            }
            Phase::Scratchpad { data, bit } => {
                let value = *bit < SCRATCHPAD_BYTES * 8 && data[*bit / 8] & (1 << (*bit % 8)) != 0;
                *bit += 1;
                value || *bit > SCRATCHPAD_BYTES * 8
            }
            _ => true,
        }
    }
}

impl OneWire for MockBus {
    type Error = MockError;

    fn reset(&mut self) -> Result<bool, MockError> {
        self.log(Op::Reset)?;
        self.phase = Phase::Rom;
        Ok(!self.devices.is_empty())
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), MockError> {
        self.log(Op::Write(byte))?;
        let phase = std::mem::replace(&mut self.phase, Phase::Idle);
        self.phase = match phase {
            Phase::Rom if byte == Command::SkipRom.op_code() => Phase::Selected(None),
            Phase::Rom if byte == Command::MatchRom.op_code() => Phase::Match(Vec::new()),
            Phase::Rom if byte == Command::SearchRom.op_code() => Phase::Search {
                bit: 0,
                step: 0,
                active: vec![true; self.devices.len()],
            },
            Phase::Rom if byte == Command::SearchRomAlarmed.op_code() => Phase::Search {
                bit: 0,
                step: 0,
                active: self.devices.iter().map(|device| device.alarmed).collect(),
            },
            Phase::Match(mut bytes) => {
                bytes.push(byte);
                if bytes.len() < Address::BYTES as usize {
                    Phase::Match(bytes)
                } else {
                    match self.devices.iter().position(|d| d.address.as_ref() == bytes.as_slice()) {
                        Some(index) => Phase::Selected(Some(index)),
                        None => Phase::Idle,
                    }
                }
            }
            Phase::Selected(_) if byte == ds18b20::Command::Convert.op_code() => {
                Phase::Converting(self.conversion_polls)
            }
            Phase::Selected(Some(index)) if byte == ds18b20::Command::ReadScratchpad.op_code() => {
                Phase::Scratchpad {
                    data: self.devices[index].scratchpad(),
                    bit: 0,
                }
            }
            _ => Phase::Idle,
        };
        Ok(())
    }

    fn write_bit(&mut self, value: bool) -> Result<(), MockError> {
        self.log(Op::WriteBit(value))?;
        if let Phase::Search { bit, step, active } = &mut self.phase {
            for (device, active) in self.devices.iter().zip(active.iter_mut()) {
                if device.address.is_bit_set(*bit) != value {
                    *active = false;
                }
            }
            *bit += 1;
            *step = 0;
        }
        Ok(())
    }

    fn read_bit(&mut self) -> Result<bool, MockError> {
        self.log(Op::ReadBit)?;
        Ok(self.next_bit())
    }

    fn read_byte(&mut self) -> Result<u8, MockError> {
        self.log(Op::ReadByte)?;
        let mut byte = 0_u8;
        for _ in 0..8 {
            byte >>= 1;
            if self.next_bit() {
                byte |= 0x80;
            }
        }
        Ok(byte)
    }
}

/// Simulated time, shared between clones; delays advance it
#[derive(Clone, Default)]
pub struct FakeTime {
    nanos: Rc<Cell<u64>>,
}

impl FakeTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ms(&self) -> u64 {
        self.nanos.get() / 1_000_000
    }
}

impl DelayNs for FakeTime {
    fn delay_ns(&mut self, ns: u32) {
        self.nanos.set(self.nanos.get() + ns as u64);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.nanos.set(self.nanos.get() + ms as u64 * 1_000_000);
    }
}

impl Clock for FakeTime {
    fn now(&self) -> Instant {
        Instant::from_ticks(self.now_ms())
    }
}

/// Collects everything it is handed
#[derive(Default)]
pub struct Recorder {
    pub reports: Vec<Report>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Sink for Recorder {
    fn changed(&mut self, report: &Report) {
        self.reports.push(*report);
    }

    fn diagnostic(&mut self, diagnostic: &Diagnostic) {
        self.diagnostics.push(*diagnostic);
    }
}

/// Output pin remembering every level it was driven to
#[derive(Default)]
pub struct MockPin {
    pub levels: Vec<bool>,
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.levels.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.levels.push(true);
        Ok(())
    }
}
