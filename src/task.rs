//! The polling task: discovery once, then one cycle per period forever

use embedded_hal::delay::DelayNs;

use crate::poller::{CycleSummary, Poller};
use crate::report::{Diagnostic, Sink};
use crate::schedule::{Clock, CycleScheduler, Wakeup};
use crate::{Error, OneWire, PollerConfig, Registry};

/// Result of one [`PollingTask::step`]
#[derive(Debug)]
pub struct Step<E: core::fmt::Debug> {
    pub cycle: Result<CycleSummary, Error<E>>,
    pub wakeup: Wakeup,
}

pub struct PollingTask<W, D, C, S, const N: usize>
where
    W: OneWire,
{
    poller: Poller<W, N>,
    delay: D,
    clock: C,
    sink: S,
    scheduler: CycleScheduler,
}

impl<W, D, C, S, const N: usize> PollingTask<W, D, C, S, N>
where
    W: OneWire,
    D: DelayNs,
    C: Clock,
    S: Sink,
{
    /// Discovers the sensors and anchors the cycle grid at the current time
    ///
    /// Only a failing bus is an error here; an empty bus leaves a task that never touches the
    /// bus again.
    pub fn new(
        mut wire: W,
        delay: D,
        clock: C,
        mut sink: S,
        config: PollerConfig,
    ) -> Result<Self, Error<W::Error>> {
        let started = clock.now();
        let registry = Registry::scan(&mut wire, &config, &mut sink)?;
        debug!(
            "Discovery took {} ms",
            clock.now().ticks().saturating_sub(started.ticks())
        );

        let scheduler = CycleScheduler::new(clock.now(), config.period());
        Ok(Self {
            poller: Poller::new(wire, registry, config),
            delay,
            clock,
            sink,
            scheduler,
        })
    }

    pub fn poller(&self) -> &Poller<W, N> {
        &self.poller
    }

    pub fn poller_mut(&mut self) -> &mut Poller<W, N> {
        &mut self.poller
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn scheduler(&self) -> &CycleScheduler {
        &self.scheduler
    }

    /// Runs one cycle and sleeps until the next one is due
    ///
    /// Cycle errors go to the sink; the task carries on regardless.
    pub fn step(&mut self) -> Step<W::Error> {
        let cycle = self.poller.cycle(&mut self.delay, &mut self.sink);
        match &cycle {
            Ok(summary) => trace!(
                "Cycle {}: {} sensors, {} changed",
                self.scheduler.slot(),
                summary.sensors,
                summary.reports
            ),
            Err(error) => {
                let diagnostic = Diagnostic::from(error);
                error!("Cycle {} failed: {}", self.scheduler.slot(), diagnostic);
                self.sink.diagnostic(&diagnostic);
            }
        }

        let wakeup = self.scheduler.next(self.clock.now());
        if wakeup.skipped > 0 {
            warn!("Cycle overran, skipping {} periods", wakeup.skipped);
            self.sink.diagnostic(&Diagnostic::Overrun {
                skipped: wakeup.skipped,
            });
        }
        let wait_ms = u32::try_from(wakeup.wait.ticks()).unwrap_or(u32::MAX);
        if wait_ms > 0 {
            self.delay.delay_ms(wait_ms);
        }

        Step { cycle, wakeup }
    }

    pub fn run(mut self) -> ! {
        info!("Polling {} sensors", self.poller.registry().len());
        loop {
            self.step();
        }
    }
}
