//! Discovered sensors and their reading state

use core::slice::{Iter, IterMut};

use heapless::Vec;

use crate::config::MAX_SENSORS;
use crate::ds18b20::{self, FLOATING_BUS};
use crate::report::{Diagnostic, SensorFault, Sink};
use crate::{Address, Error, OneWire, PollerConfig, SearchMode};

/// Value of `previous` before the first report, absolute zero
pub const NEVER_MEASURED: f32 = -273.15;

/// Reading state of a single sensor
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorRecord {
    address: Address,
    raw: u16,
    current: f32,
    previous: f32,
    fault: Option<SensorFault>,
}

impl SensorRecord {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            raw: 0,
            current: NEVER_MEASURED,
            previous: NEVER_MEASURED,
            fault: None,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Last temperature register value, 1/16 °C two's complement
    pub fn raw(&self) -> u16 {
        self.raw
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    /// Last reported value, [`NEVER_MEASURED`] until the first report
    pub fn previous(&self) -> f32 {
        self.previous
    }

    pub fn fault(&self) -> Option<SensorFault> {
        self.fault
    }

    pub fn is_measured(&self) -> bool {
        self.previous != NEVER_MEASURED
    }

    pub fn has_changed(&self) -> bool {
        self.fault.is_none() && self.current != self.previous
    }

    /// Stores a fresh register value and classifies it
    pub fn update(&mut self, raw: u16, config: &PollerConfig) {
        self.raw = raw;
        let celsius = ds18b20::raw_to_celsius(raw);
        self.fault = if raw == FLOATING_BUS && !config.verify_crc {
            Some(SensorFault::Disconnected)
        } else if !config.is_plausible(celsius) {
            Some(SensorFault::OutOfRange)
        } else {
            self.current = celsius;
            None
        };
    }

    pub fn set_fault(&mut self, fault: SensorFault) {
        self.fault = Some(fault);
    }

    pub(crate) fn mark_reported(&mut self) {
        self.previous = self.current;
    }
}

/// Runs the ROM search and collects the addresses in discovery order
///
/// Stops with [`Error::TooManyDevices`] once `found` is full. ROM codes failing their CRC are
/// skipped and the search goes on; the first one is returned as [`Error::CrcMismatch`] at the
/// end. Either way the addresses collected so far stay in `found`.
pub fn discover<W: OneWire, const N: usize>(
    wire: &mut W,
    mode: SearchMode,
    found: &mut Vec<Address, N>,
) -> Result<usize, Error<W::Error>> {
    found.clear();
    let mut corrupted: Option<(u8, u8)> = None;
    let mut skipped = 0;
    for address in wire.devices(mode) {
        match address {
            Ok(address) => {
                if found.push(address).is_err() {
                    return Err(Error::TooManyDevices(N));
                }
            }
            Err(Error::CrcMismatch(computed, expected)) => {
                warn!("Skipping ROM code with crc {}, expected {}", computed, expected);
                corrupted.get_or_insert((computed, expected));
                skipped += 1;
                // a bus that keeps garbling codes would never run out of branches
                if skipped > N {
                    break;
                }
            }
            Err(error) => return Err(error),
        }
    }
    match corrupted {
        Some((computed, expected)) => Err(Error::CrcMismatch(computed, expected)),
        None if found.is_empty() => Err(Error::BusEmpty),
        None => Ok(found.len()),
    }
}

/// The sensors found at startup, in discovery order
#[derive(Clone, Debug, Default)]
pub struct Registry<const N: usize = MAX_SENSORS> {
    records: Vec<SensorRecord, N>,
}

impl<const N: usize> Registry<N> {
    pub fn new(addresses: &Vec<Address, N>) -> Self {
        Self {
            records: addresses.iter().copied().map(SensorRecord::new).collect(),
        }
    }

    /// Discovers the bus and builds the registry from whatever was found
    ///
    /// An empty or overfull bus, corrupted ROM codes and an unexpected number of sensors only
    /// end up in `sink`. Port errors are returned.
    pub fn scan<W: OneWire>(
        wire: &mut W,
        config: &PollerConfig,
        sink: &mut impl Sink,
    ) -> Result<Self, Error<W::Error>> {
        let mut found = Vec::new();
        match discover(wire, config.search_mode, &mut found) {
            Ok(count) => info!("Detected {} OneWire devices", count),
            Err(Error::BusEmpty) => {
                warn!("No OneWire devices detected, polling disabled");
                sink.diagnostic(&Diagnostic::BusEmpty);
            }
            Err(Error::TooManyDevices(capacity)) => {
                warn!("More than {} OneWire devices, ignoring the rest", capacity);
                sink.diagnostic(&Diagnostic::TooManyDevices { capacity });
            }
            Err(Error::CrcMismatch(computed, expected)) => {
                warn!("Corrupted ROM code during discovery, keeping {} devices", found.len());
                sink.diagnostic(&Diagnostic::CrcMismatch { computed, expected });
            }
            Err(error) => return Err(error),
        }

        for address in found.iter() {
            if address.family_code() != ds18b20::FAMILY_CODE {
                warn!("Unexpected family code {} at {}", address.family_code(), address);
            } else {
                debug!("Found DS18B20 at {}", address);
            }
        }

        if let Some(expected) = config.expected_sensors {
            if expected != found.len() {
                warn!(
                    "Sensors count mismatch! Expected: {}, saw: {}",
                    expected,
                    found.len()
                );
                sink.diagnostic(&Diagnostic::DeviceCountMismatch {
                    expected,
                    found: found.len(),
                });
            }
        }

        Ok(Self::new(&found))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn get(&self, index: usize) -> Option<&SensorRecord> {
        self.records.get(index)
    }

    pub fn iter(&self) -> Iter<'_, SensorRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, SensorRecord> {
        self.records.iter_mut()
    }

    pub fn records_mut(&mut self) -> &mut [SensorRecord] {
        &mut self.records
    }
}
