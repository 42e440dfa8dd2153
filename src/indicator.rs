//! Board status LED
//!
//! Boards differ in how their LED is reached (a plain GPIO, an active-low GPIO, a pin behind a
//! radio chip). Anything implementing [`OutputPin`] is an [`Indicator`]; wrap active-low pins in
//! [`Inverted`].

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};

pub trait Indicator {
    type Error: core::fmt::Debug;

    fn set(&mut self, on: bool) -> Result<(), Self::Error>;
}

impl<P: OutputPin> Indicator for P {
    type Error = P::Error;

    fn set(&mut self, on: bool) -> Result<(), Self::Error> {
        self.set_state(on.into())
    }
}

/// Inverted wire wrapper
pub struct Inverted<P>(pub P);

impl<P: ErrorType> ErrorType for Inverted<P> {
    type Error = P::Error;
}

impl<O> OutputPin for Inverted<O>
where
    O: OutputPin,
{
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.set_high()
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.set_low()
    }
}

/// Liveness blink shown next to the polling task
pub struct Heartbeat<I: Indicator> {
    indicator: I,
    on_ms: u32,
    off_ms: u32,
}

impl<I: Indicator> Heartbeat<I> {
    /// 10 % duty cycle, one blink per second
    pub fn new(indicator: I) -> Self {
        Self::with_timing(indicator, 100, 900)
    }

    pub fn with_timing(indicator: I, on_ms: u32, off_ms: u32) -> Self {
        Self {
            indicator,
            on_ms,
            off_ms,
        }
    }

    /// Three fast flashes, the first sign of life at boot
    pub fn hello(&mut self, delay: &mut impl DelayNs) -> Result<(), I::Error> {
        for _ in 0..3 {
            self.indicator.set(true)?;
            delay.delay_ms(10);
            self.indicator.set(false)?;
            delay.delay_ms(50);
        }
        Ok(())
    }

    pub fn beat(&mut self, delay: &mut impl DelayNs) -> Result<(), I::Error> {
        self.indicator.set(true)?;
        delay.delay_ms(self.on_ms);
        self.indicator.set(false)?;
        delay.delay_ms(self.off_ms);
        Ok(())
    }

    /// Blinks forever; a failing LED is logged once and then left alone
    pub fn run(mut self, delay: &mut impl DelayNs) -> ! {
        let mut failed = false;
        loop {
            if self.beat(delay).is_err() && !failed {
                error!("Status LED not responding");
                failed = true;
            }
        }
    }

    pub fn release(self) -> I {
        self.indicator
    }
}
