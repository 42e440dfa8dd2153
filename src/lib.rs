#![cfg_attr(not(test), no_std)]
#![doc = include_str!("../README.md")]

#[macro_use]
mod fmt;

mod address;
mod bus;
mod command;
pub mod config;
pub mod ds18b20;
pub mod indicator;
pub mod poller;
mod registry;
pub mod report;
mod result;
pub mod schedule;
mod search;
pub mod task;

#[cfg(test)]
mod mock;

pub use address::Address;
pub use bus::{OneWire, SearchMode};
pub use command::{Command, OpCode};
pub use config::{PollerConfig, MAX_SENSORS};
pub use indicator::{Heartbeat, Indicator, Inverted};
pub use poller::{CycleSummary, Poller, State};
pub use registry::{discover, Registry, SensorRecord, NEVER_MEASURED};
#[cfg(feature = "defmt")]
pub use report::LogSink;
pub use report::{Diagnostic, Report, SensorFault, Sink, TextSink};
pub use result::Error;
pub use schedule::{Clock, CycleScheduler, Duration, Instant};
pub use search::{DeviceSearch, DeviceSearchIter};
pub use task::PollingTask;

/// Dallas/Maxim CRC-8 (polynomial x^8 + x^5 + x^4 + 1) continued from `crc`
pub fn compute_partial_crc8(crc: u8, data: &[u8]) -> u8 {
    let mut crc = crc;
    for byte in data.iter() {
        let mut byte = *byte;
        for _ in 0..8 {
            let mix = (crc ^ byte) & 0x01;
            crc >>= 1;
            if mix != 0x00 {
                crc ^= 0x8C;
            }
            byte >>= 1;
        }
    }
    crc
}
