use enumflags2::{bitflags, BitFlags};
use speedy::Endianness;

/// Flag bit 0 of every submessage selects the endianness of its
/// contents; set means little-endian. The remaining bits are
/// interpreted per submessage kind.
pub trait FromEndianness {
  fn from_endianness(endianness: Endianness) -> Self;
}

macro_rules! submessageflag_impls {
  ($t:ident) => {
    impl FromEndianness for BitFlags<$t> {
      fn from_endianness(endianness: Endianness) -> Self {
        if endianness == Endianness::LittleEndian {
          $t::Endianness.into()
        } else {
          Self::empty()
        }
      }
    }
  };
}

#[bitflags]
#[repr(u8)]
#[derive(Debug, PartialOrd, PartialEq, Ord, Eq, Clone, Copy)]
#[allow(non_camel_case_types)]
pub enum DATA_Flags {
  Endianness = 0b00001,
  InlineQos = 0b00010,
  Data = 0b00100,
  Key = 0b01000,
}
submessageflag_impls!(DATA_Flags);

#[bitflags]
#[repr(u8)]
#[derive(Debug, PartialOrd, PartialEq, Ord, Eq, Clone, Copy)]
#[allow(non_camel_case_types)]
pub enum HEARTBEAT_Flags {
  Endianness = 0b001,
  Final = 0b010,
  Liveliness = 0b100,
}
submessageflag_impls!(HEARTBEAT_Flags);

#[bitflags]
#[repr(u8)]
#[derive(Debug, PartialOrd, PartialEq, Ord, Eq, Clone, Copy)]
#[allow(non_camel_case_types)]
pub enum ACKNACK_Flags {
  Endianness = 0b01,
  Final = 0b10,
}
submessageflag_impls!(ACKNACK_Flags);

#[bitflags]
#[repr(u8)]
#[derive(Debug, PartialOrd, PartialEq, Ord, Eq, Clone, Copy)]
#[allow(non_camel_case_types)]
pub enum INFOTIMESTAMP_Flags {
  Endianness = 0b01,
  Invalidate = 0b10,
}
submessageflag_impls!(INFOTIMESTAMP_Flags);

#[bitflags]
#[repr(u8)]
#[derive(Debug, PartialOrd, PartialEq, Ord, Eq, Clone, Copy)]
#[allow(non_camel_case_types)]
pub enum INFODESTINATION_Flags {
  Endianness = 0b01,
}
submessageflag_impls!(INFODESTINATION_Flags);

pub fn endianness_flag(flags: u8) -> Endianness {
  if (flags & 0x01) != 0 {
    Endianness::LittleEndian
  } else {
    Endianness::BigEndian
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn endianness_flag_bit_zero() {
    assert_eq!(Endianness::BigEndian, endianness_flag(0x00));
    assert_eq!(Endianness::LittleEndian, endianness_flag(0x01));
    assert_eq!(Endianness::LittleEndian, endianness_flag(0x03));
  }

  #[test]
  fn from_endianness_sets_only_bit_zero() {
    let le = BitFlags::<DATA_Flags>::from_endianness(Endianness::LittleEndian);
    assert_eq!(le.bits(), 0x01);
    let be = BitFlags::<DATA_Flags>::from_endianness(Endianness::BigEndian);
    assert_eq!(be.bits(), 0x00);
  }
}
