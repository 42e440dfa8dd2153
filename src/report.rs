//! Change-gated reporting
//!
//! A sensor is reported when its value differs from the one reported last time. Faults and
//! other non-fatal conditions reach the [`Sink`] as [`Diagnostic`]s.

use core::fmt::{Debug, Display, Formatter, Result as FmtResult, Write};

use crate::ds18b20::celsius_to_fahrenheit;
use crate::{Error, SensorRecord};

/// One changed sensor value
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Report {
    /// Position of the sensor in discovery order
    pub index: usize,
    pub celsius: f32,
    pub fahrenheit: f32,
    pub raw: u16,
}

impl Report {
    pub fn new(index: usize, record: &SensorRecord) -> Self {
        Self {
            index,
            celsius: record.current(),
            fahrenheit: celsius_to_fahrenheit(record.current()),
            raw: record.raw(),
        }
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(
            f,
            "Sensor {} temp is {:.1}C [{:.1}F], raw:{:04X}",
            self.index, self.celsius, self.fahrenheit, self.raw
        )
    }
}

/// Why a single reading was not trusted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorFault {
    /// Decoded value outside the configured range
    OutOfRange,
    /// All-ones reading, nothing drove the line
    Disconnected,
    /// Scratchpad CRC-8 did not match
    CrcMismatch { computed: u8, expected: u8 },
}

/// Non-fatal condition worth telling somebody about
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Diagnostic {
    BusEmpty,
    TooManyDevices { capacity: usize },
    DeviceCountMismatch { expected: usize, found: usize },
    SensorFault { index: usize, fault: SensorFault },
    BusTimeout { polls: u32 },
    NoPresence,
    CrcMismatch { computed: u8, expected: u8 },
    PortError,
    /// The last cycle ran past this many deadlines
    Overrun { skipped: u64 },
}

impl<E: Debug> From<&Error<E>> for Diagnostic {
    fn from(error: &Error<E>) -> Self {
        match *error {
            Error::BusEmpty => Diagnostic::BusEmpty,
            Error::TooManyDevices(capacity) => Diagnostic::TooManyDevices { capacity },
            Error::NoPresence => Diagnostic::NoPresence,
            Error::BusTimeout(polls) => Diagnostic::BusTimeout { polls },
            Error::CrcMismatch(computed, expected) => {
                Diagnostic::CrcMismatch { computed, expected }
            }
            Error::PortError(_) => Diagnostic::PortError,
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Diagnostic::BusEmpty => f.write_str("No sensors found on the bus"),
            Diagnostic::TooManyDevices { capacity } => {
                write!(f, "More than {} sensors on the bus, ignoring the rest", capacity)
            }
            Diagnostic::DeviceCountMismatch { expected, found } => {
                write!(f, "Sensors count mismatch! Expected: {}, saw: {}", expected, found)
            }
            Diagnostic::SensorFault { index, fault } => match fault {
                SensorFault::OutOfRange => write!(f, "Sensor {} reading out of range", index),
                SensorFault::Disconnected => write!(f, "Sensor {} not responding", index),
                SensorFault::CrcMismatch { computed, expected } => write!(
                    f,
                    "Sensor {} scratchpad crc {:02X}, expected {:02X}",
                    index, computed, expected
                ),
            },
            Diagnostic::BusTimeout { polls } => {
                write!(f, "Conversion not finished after {} polls", polls)
            }
            Diagnostic::NoPresence => f.write_str("No presence pulse on the bus"),
            Diagnostic::CrcMismatch { computed, expected } => {
                write!(f, "ROM crc {:02X}, expected {:02X}", computed, expected)
            }
            Diagnostic::PortError => f.write_str("Bus port error"),
            Diagnostic::Overrun { skipped } => {
                write!(f, "Cycle overran, skipped {} periods", skipped)
            }
        }
    }
}

/// Destination of reports and diagnostics
pub trait Sink {
    fn changed(&mut self, report: &Report);

    fn diagnostic(&mut self, diagnostic: &Diagnostic);
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn changed(&mut self, report: &Report) {
        (**self).changed(report)
    }

    fn diagnostic(&mut self, diagnostic: &Diagnostic) {
        (**self).diagnostic(diagnostic)
    }
}

/// Writes one line per event, e.g. to a serial console
pub struct TextSink<W: Write>(pub W);

impl<W: Write> Sink for TextSink<W> {
    fn changed(&mut self, report: &Report) {
        // nowhere left to report a failing console to
        let _ = writeln!(self.0, "{}", report);
    }

    fn diagnostic(&mut self, diagnostic: &Diagnostic) {
        let _ = writeln!(self.0, "{}", diagnostic);
    }
}

/// Forwards everything to `defmt`, in the same text as [`TextSink`]
#[cfg(feature = "defmt")]
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

#[cfg(feature = "defmt")]
impl Sink for LogSink {
    fn changed(&mut self, report: &Report) {
        info!("{}", defmt::Display2Format(report));
    }

    fn diagnostic(&mut self, diagnostic: &Diagnostic) {
        warn!("{}", defmt::Display2Format(diagnostic));
    }
}

/// Reports every record whose value changed and remembers it as reported
///
/// Faulted records only produce a diagnostic and keep their previous value. Returns the number of
/// reports.
pub fn publish(records: &mut [SensorRecord], sink: &mut impl Sink) -> usize {
    let mut reported = 0;
    for (index, record) in records.iter_mut().enumerate() {
        if let Some(fault) = record.fault() {
            sink.diagnostic(&Diagnostic::SensorFault { index, fault });
            continue;
        }
        if record.has_changed() {
            sink.changed(&Report::new(index, record));
            record.mark_reported();
            reported += 1;
        }
    }
    reported
}
