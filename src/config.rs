//! Polling configuration

use crate::ds18b20::{CONVERSION_TIME_MS, MAX_CELSIUS, MIN_CELSIUS};
use crate::schedule::Duration;
use crate::SearchMode;

/// Number of sensors a registry holds unless told otherwise
pub const MAX_SENSORS: usize = 20;

/// Timing and validation parameters of the polling task
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollerConfig {
    /// Time between the starts of two cycles (milliseconds)
    pub period_ms: u32,
    /// Sleep between two conversion-complete polls (milliseconds)
    pub poll_interval_ms: u32,
    /// Give up waiting for the conversion after this long (milliseconds)
    pub conversion_timeout_ms: u32,
    /// Devices taking part in discovery
    pub search_mode: SearchMode,
    /// Number of sensors the installation is wired for, if known
    pub expected_sensors: Option<usize>,
    /// Read the whole scratchpad and check its CRC-8
    pub verify_crc: bool,
    /// Readings below are treated as faults (°C)
    pub min_celsius: f32,
    /// Readings above are treated as faults (°C)
    pub max_celsius: f32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PollerConfig {
    pub const fn new() -> Self {
        Self {
            period_ms: 1000,
            poll_interval_ms: 10,
            conversion_timeout_ms: CONVERSION_TIME_MS * 2,
            search_mode: SearchMode::All,
            expected_sensors: None,
            verify_crc: false,
            min_celsius: MIN_CELSIUS,
            max_celsius: MAX_CELSIUS,
        }
    }

    pub const fn with_period_ms(mut self, period_ms: u32) -> Self {
        self.period_ms = period_ms;
        self
    }

    pub const fn with_poll_interval_ms(mut self, poll_interval_ms: u32) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    pub const fn with_conversion_timeout_ms(mut self, conversion_timeout_ms: u32) -> Self {
        self.conversion_timeout_ms = conversion_timeout_ms;
        self
    }

    pub const fn with_search_mode(mut self, search_mode: SearchMode) -> Self {
        self.search_mode = search_mode;
        self
    }

    pub const fn with_expected_sensors(mut self, expected_sensors: usize) -> Self {
        self.expected_sensors = Some(expected_sensors);
        self
    }

    pub const fn with_crc_check(mut self, verify_crc: bool) -> Self {
        self.verify_crc = verify_crc;
        self
    }

    pub const fn with_valid_range(mut self, min_celsius: f32, max_celsius: f32) -> Self {
        self.min_celsius = min_celsius;
        self.max_celsius = max_celsius;
        self
    }

    pub fn period(&self) -> Duration {
        Duration::from_ticks(self.period_ms as u64)
    }

    /// Number of completion polls before a conversion counts as timed out, at least one
    pub fn max_polls(&self) -> u32 {
        let interval = self.poll_interval_ms.max(1);
        self.conversion_timeout_ms.div_ceil(interval).max(1)
    }

    pub fn is_plausible(&self, celsius: f32) -> bool {
        (self.min_celsius..=self.max_celsius).contains(&celsius)
    }
}
