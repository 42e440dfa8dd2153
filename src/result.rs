use core::fmt::{Debug, Display, Formatter, Result as FmtResult};

/// Error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E: Sized + Debug> {
    /// Discovery did not find a single device
    BusEmpty,
    /// More devices answered the search than the registry holds (its capacity)
    TooManyDevices(usize),
    /// No presence pulse after a reset
    NoPresence,
    /// Conversion still running after the given number of polls
    BusTimeout(u32),
    /// Computed and received CRC-8 of a ROM code
    CrcMismatch(u8, u8),
    PortError(E),
}

impl<E: Sized + Debug> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::PortError(e)
    }
}

impl<E: Sized + Debug> Display for Error<E> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Error::BusEmpty => f.write_str("no device found on the bus"),
            Error::TooManyDevices(capacity) => {
                write!(f, "more than {} devices on the bus", capacity)
            }
            Error::NoPresence => f.write_str("no presence pulse"),
            Error::BusTimeout(polls) => {
                write!(f, "conversion not finished after {} polls", polls)
            }
            Error::CrcMismatch(computed, expected) => {
                write!(f, "crc mismatch: computed {:02X}, got {:02X}", computed, expected)
            }
            Error::PortError(e) => write!(f, "port error: {:?}", e),
        }
    }
}
