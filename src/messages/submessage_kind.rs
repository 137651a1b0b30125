use std::fmt;
use std::fmt::Debug;

use speedy::{Readable, Writable};

#[derive(Copy, Clone, PartialEq, Eq, Readable, Writable)]
pub struct SubmessageKind {
  value: u8,
}

impl SubmessageKind {
  pub const PAD: SubmessageKind = SubmessageKind { value: 0x01 };
  pub const ACKNACK: SubmessageKind = SubmessageKind { value: 0x06 };
  pub const HEARTBEAT: SubmessageKind = SubmessageKind { value: 0x07 };
  pub const GAP: SubmessageKind = SubmessageKind { value: 0x08 };
  pub const INFO_TS: SubmessageKind = SubmessageKind { value: 0x09 };
  pub const INFO_DST: SubmessageKind = SubmessageKind { value: 0x0e };
  pub const DATA: SubmessageKind = SubmessageKind { value: 0x15 };

  pub fn from_u8(value: u8) -> SubmessageKind {
    SubmessageKind { value }
  }

  pub fn as_u8(self) -> u8 {
    self.value
  }
}

impl Debug for SubmessageKind {
  fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
    match *self {
      SubmessageKind::PAD => fmt.write_str("PAD"),
      SubmessageKind::ACKNACK => fmt.write_str("ACKNACK"),
      SubmessageKind::HEARTBEAT => fmt.write_str("HEARTBEAT"),
      SubmessageKind::GAP => fmt.write_str("GAP"),
      SubmessageKind::INFO_TS => fmt.write_str("INFO_TS"),
      SubmessageKind::INFO_DST => fmt.write_str("INFO_DST"),
      SubmessageKind::DATA => fmt.write_str("DATA"),
      SubmessageKind { value } => fmt.write_fmt(format_args!("SubmessageKind 0x{value:02x}")),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  serialization_test!( type = SubmessageKind,
  {
      submessage_kind_acknack,
      SubmessageKind::ACKNACK,
      le = [0x06],
      be = [0x06]
  },
  {
      submessage_kind_heartbeat,
      SubmessageKind::HEARTBEAT,
      le = [0x07],
      be = [0x07]
  },
  {
      submessage_kind_info_ts,
      SubmessageKind::INFO_TS,
      le = [0x09],
      be = [0x09]
  },
  {
      submessage_kind_info_dst,
      SubmessageKind::INFO_DST,
      le = [0x0e],
      be = [0x0e]
  },
  {
      submessage_kind_data,
      SubmessageKind::DATA,
      le = [0x15],
      be = [0x15]
  });
}
