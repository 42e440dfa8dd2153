//! One measurement cycle over the whole bus
//!
//! Every cycle starts a conversion on all sensors at once, waits for the bus to report
//! completion, then reads the sensors one after the other in discovery order.

use embedded_hal::delay::DelayNs;

use crate::ds18b20::{self, SCRATCHPAD_BYTES, TEMPERATURE_BYTES};
use crate::report::{self, SensorFault, Sink};
use crate::{Address, Error, OneWire, PollerConfig, Registry};

/// Where the poller currently is within a cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    #[default]
    Idle,
    Converting,
    AwaitingCompletion,
    Reading,
    Reporting,
}

/// What a completed cycle did
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CycleSummary {
    /// Completion polls until the conversion finished
    pub polls: u32,
    /// Sensors read
    pub sensors: usize,
    /// Changes reported
    pub reports: usize,
}

pub struct Poller<W: OneWire, const N: usize> {
    wire: W,
    registry: Registry<N>,
    config: PollerConfig,
    state: State,
}

impl<W: OneWire, const N: usize> Poller<W, N> {
    pub fn new(wire: W, registry: Registry<N>, config: PollerConfig) -> Self {
        Self {
            wire,
            registry,
            config,
            state: State::Idle,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn registry(&self) -> &Registry<N> {
        &self.registry
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    pub fn wire(&self) -> &W {
        &self.wire
    }

    pub fn wire_mut(&mut self) -> &mut W {
        &mut self.wire
    }

    pub fn release(self) -> (W, Registry<N>) {
        (self.wire, self.registry)
    }

    /// Runs a full cycle: convert, await completion, read, report
    ///
    /// With an empty registry nothing is sent on the bus. Whatever happens, the poller is
    /// [`State::Idle`] afterwards.
    pub fn cycle(
        &mut self,
        delay: &mut impl DelayNs,
        sink: &mut impl Sink,
    ) -> Result<CycleSummary, Error<W::Error>> {
        if self.registry.is_empty() {
            return Ok(CycleSummary::default());
        }
        let result = self.measure(delay, sink);
        self.state = State::Idle;
        result
    }

    fn measure(
        &mut self,
        delay: &mut impl DelayNs,
        sink: &mut impl Sink,
    ) -> Result<CycleSummary, Error<W::Error>> {
        self.start_conversion()?;
        let polls = self.await_completion(delay)?;
        let sensors = self.read_all()?;

        self.state = State::Reporting;
        let reports = report::publish(self.registry.records_mut(), sink);

        Ok(CycleSummary {
            polls,
            sensors,
            reports,
        })
    }

    fn start_conversion(&mut self) -> Result<(), Error<W::Error>> {
        self.state = State::Converting;
        trace!("Starting temperature conversion");
        if !self.wire.reset()? {
            return Err(Error::NoPresence);
        }
        self.wire.skip()?;
        self.wire.write_command(ds18b20::Command::Convert)?;
        Ok(())
    }

    fn await_completion(&mut self, delay: &mut impl DelayNs) -> Result<u32, Error<W::Error>> {
        self.state = State::AwaitingCompletion;
        let max_polls = self.config.max_polls();
        for poll in 1..=max_polls {
            delay.delay_ms(self.config.poll_interval_ms);
            if self.wire.read_bit()? {
                return Ok(poll);
            }
        }
        warn!("Conversion not finished after {} polls", max_polls);
        Err(Error::BusTimeout(max_polls))
    }

    fn read_all(&mut self) -> Result<usize, Error<W::Error>> {
        self.state = State::Reading;
        let Self {
            wire,
            registry,
            config,
            ..
        } = self;
        for record in registry.iter_mut() {
            match read_temperature(wire, record.address(), config.verify_crc)? {
                Ok(raw) => record.update(raw, config),
                Err(fault) => record.set_fault(fault),
            }
        }
        Ok(registry.len())
    }
}

/// Reads the temperature register of one sensor
///
/// The outer error aborts the cycle, the inner one only concerns this sensor.
fn read_temperature<W: OneWire>(
    wire: &mut W,
    address: &Address,
    verify_crc: bool,
) -> Result<Result<u16, SensorFault>, Error<W::Error>> {
    if !wire.reset()? {
        return Err(Error::NoPresence);
    }
    wire.select(address)?;
    wire.write_command(ds18b20::Command::ReadScratchpad)?;

    let mut scratchpad = [0u8; SCRATCHPAD_BYTES];
    if verify_crc {
        wire.read_bytes(&mut scratchpad)?;
        if let Err((computed, expected)) = ds18b20::check_scratchpad(&scratchpad) {
            warn!("Scratchpad crc mismatch at {}", address);
            return Ok(Err(SensorFault::CrcMismatch { computed, expected }));
        }
    } else {
        wire.read_bytes(&mut scratchpad[..TEMPERATURE_BYTES])?;
    }
    Ok(Ok(ds18b20::temperature_from_scratchpad(&scratchpad)))
}
