use crate::{Address, Error, OneWire, OpCode, SearchMode};

/// State of a ROM search, carried from one found device to the next
///
/// Bit positions are 1-based, 0 meaning "none", as in Maxim application note 187.
#[derive(Clone, Debug, Default)]
pub struct DeviceSearch {
    address: [u8; Address::BYTES as usize],
    last_discrepancy: u8,
    done: bool,
    mode: SearchMode,
}

impl DeviceSearch {
    pub fn new(mode: SearchMode) -> DeviceSearch {
        DeviceSearch {
            mode,
            ..Default::default()
        }
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Bit position of the last unresolved branch, if any is left
    pub fn last_discrepancy(&self) -> Option<u8> {
        match self.last_discrepancy {
            0 => None,
            bit => Some(bit - 1),
        }
    }

    pub fn into_iter<W: OneWire>(self, wire: &mut W) -> DeviceSearchIter<'_, W> {
        DeviceSearchIter {
            search: Some(self),
            wire,
        }
    }

    fn write_bit_in_address(&mut self, bit: u8, value: bool) {
        let index = (bit / 8) as usize;
        let mask = 0x01 << (bit % 8);
        if value {
            self.address[index] |= mask;
        } else {
            self.address[index] &= !mask;
        }
    }

    pub(crate) fn step<W: OneWire + ?Sized>(
        &mut self,
        wire: &mut W,
    ) -> Result<Option<Address>, Error<W::Error>> {
        if self.done {
            return Ok(None);
        }

        if !wire.reset()? {
            self.done = true;
            return Ok(None);
        }
        wire.write_byte(self.mode.command().op_code())?;

        let previous = Address::from(self.address);
        let mut last_zero = 0_u8;

        for bit in 0..Address::BITS {
            let position = bit + 1;
            let id_bit = wire.read_bit()?;
            let cmp_id_bit = wire.read_bit()?;

            let direction = match (id_bit, cmp_id_bit) {
                (true, true) => {
                    // nobody is driving the line anymore
                    self.done = true;
                    return Ok(None);
                }
                (false, false) => {
                    // devices with 0 and 1 at this position
                    let direction = if position < self.last_discrepancy {
                        previous.is_bit_set(bit)
                    } else {
                        position == self.last_discrepancy
                    };
                    if !direction {
                        last_zero = position;
                    }
                    direction
                }
                (bit0, _) => bit0,
            };

            self.write_bit_in_address(bit, direction);
            wire.write_bit(direction)?;
        }

        self.last_discrepancy = last_zero;
        if last_zero == 0 {
            self.done = true;
        }

        // a corrupted code still settles its branch, the search goes on from `last_discrepancy`
        let address = Address::from(self.address);
        if !address.is_crc_valid() {
            return Err(Error::CrcMismatch(address.compute_crc8(), address.crc8()));
        }
        Ok(Some(address))
    }
}

pub struct DeviceSearchIter<'a, W: OneWire> {
    search: Option<DeviceSearch>,
    wire: &'a mut W,
}

impl<'a, W: OneWire> Iterator for DeviceSearchIter<'a, W> {
    type Item = Result<Address, Error<W::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut search = self.search.take()?;
        let result = self.wire.search_next(&mut search).transpose()?;
        if matches!(result, Ok(_) | Err(Error::CrcMismatch(..))) {
            self.search = Some(search);
        }
        Some(result)
    }
}
