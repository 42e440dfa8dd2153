use crate::{Address, Command, DeviceSearch, DeviceSearchIter, Error, OpCode};
use core::fmt::Debug;

/// Which devices take part in a ROM search
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SearchMode {
    #[default]
    All,
    /// Only devices with an active alarm flag answer
    Alarmed,
}

impl SearchMode {
    pub fn command(self) -> Command {
        match self {
            SearchMode::All => Command::SearchRom,
            SearchMode::Alarmed => Command::SearchRomAlarmed,
        }
    }
}

/// Byte and bit level access to a OneWire bus
///
/// Implementors provide the signaling (bit-banged GPIO, PIO state machine, bridge chip, ...).
/// Every call may block for bus timing reasons but never suspends the calling task.
pub trait OneWire {
    type Error: Sized + Debug;

    /// Issues a reset pulse, returns `true` if at least one device answered with a presence pulse
    fn reset(&mut self) -> Result<bool, Self::Error>;

    /// Sends one byte, least significant bit first
    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error>;

    fn write_bit(&mut self, bit: bool) -> Result<(), Self::Error>;

    fn read_bit(&mut self) -> Result<bool, Self::Error>;

    /// Reads one byte, least significant bit first
    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        let mut byte = 0_u8;
        for _ in 0..8 {
            byte >>= 1;
            if self.read_bit()? {
                byte |= 0x80;
            }
        }
        Ok(byte)
    }

    fn read_bytes(&mut self, dst: &mut [u8]) -> Result<(), Self::Error> {
        for d in dst {
            *d = self.read_byte()?;
        }
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        for b in bytes {
            self.write_byte(*b)?;
        }
        Ok(())
    }

    fn write_command(&mut self, cmd: impl OpCode) -> Result<(), Self::Error> {
        self.write_byte(cmd.op_code())
    }

    /// Addresses all devices at once
    fn skip(&mut self) -> Result<(), Self::Error> {
        self.write_command(Command::SkipRom)
    }

    /// Addresses the single device with the given ROM code
    fn select(&mut self, addr: &Address) -> Result<(), Self::Error> {
        self.write_command(Command::MatchRom)?;
        self.write_bytes(addr.as_ref())
    }

    /// Runs one pass of the ROM search, `Ok(None)` once every device has been found
    ///
    /// The provided implementation walks the search tree with [`OneWire::read_bit`] and
    /// [`OneWire::write_bit`]; adapters with a hardware search may override it.
    fn search_next(
        &mut self,
        search: &mut DeviceSearch,
    ) -> Result<Option<Address>, Error<Self::Error>> {
        search.step(self)
    }

    fn devices(&mut self, mode: SearchMode) -> DeviceSearchIter<'_, Self>
    where
        Self: Sized,
    {
        DeviceSearch::new(mode).into_iter(self)
    }
}
