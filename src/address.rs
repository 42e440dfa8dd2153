use crate::compute_partial_crc8;
use byteorder::{ByteOrder, LittleEndian};
use core::{
    fmt::{Display, Formatter, Result as FmtResult},
    ops::Deref,
};

/// 64-bit ROM code of a bus device
///
/// The bytes are kept in wire order: the family code first, the CRC-8 last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct Address {
    raw: [u8; Self::BYTES as usize],
}

impl From<[u8; Self::BYTES as usize]> for Address {
    fn from(raw: [u8; Self::BYTES as usize]) -> Self {
        Address { raw }
    }
}

impl From<Address> for [u8; Address::BYTES as usize] {
    fn from(addr: Address) -> [u8; Address::BYTES as usize] {
        addr.raw
    }
}

/// The least significant byte of the integer is the first byte on the wire.
impl From<u64> for Address {
    fn from(value: u64) -> Self {
        let mut raw = [0; Self::BYTES as usize];
        LittleEndian::write_u64(&mut raw, value);
        Address { raw }
    }
}

impl From<Address> for u64 {
    fn from(addr: Address) -> u64 {
        LittleEndian::read_u64(&addr.raw)
    }
}

impl Deref for Address {
    type Target = [u8; Self::BYTES as usize];

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.raw
    }
}

impl Address {
    /// The length of device address in bytes
    pub const BYTES: u8 = 8;

    /// The length of device address in bits
    pub const BITS: u8 = Self::BYTES * 8;

    pub fn family_code(&self) -> u8 {
        self.raw[0]
    }

    /// CRC-8 stored in the last ROM byte
    pub fn crc8(&self) -> u8 {
        self.raw[Self::BYTES as usize - 1]
    }

    /// CRC-8 computed over the family code and serial number
    pub fn compute_crc8(&self) -> u8 {
        compute_partial_crc8(0, &self.raw[..Self::BYTES as usize - 1])
    }

    pub fn is_crc_valid(&self) -> bool {
        self.compute_crc8() == self.crc8()
    }

    pub(crate) fn is_bit_set(&self, bit: u8) -> bool {
        self.raw[(bit / 8) as usize] & (0x01 << (bit % 8)) != 0x00
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self[0], self[1], self[2], self[3], self[4], self[5], self[6], self[7],
        )
    }
}
