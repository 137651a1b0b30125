use speedy::{Readable, Writable};

/// NTP-style wall-clock timestamp carried in INFO_TS: whole seconds plus
/// a 1/2^32 fractional part, origin at the Unix epoch. Called `Time_t`
/// in the RTPS spec.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Readable, Writable)]
pub struct Timestamp {
  seconds: i32,
  fraction: u32,
}

impl Timestamp {
  pub const ZERO: Timestamp = Timestamp {
    seconds: 0,
    fraction: 0,
  };
  pub const INVALID: Timestamp = Timestamp {
    seconds: -1,
    fraction: 0xFFFF_FFFF,
  };
  pub const INFINITE: Timestamp = Timestamp {
    seconds: 0x7FFF_FFFF,
    fraction: 0xFFFF_FFFF,
  };

  pub fn now() -> Timestamp {
    let now = chrono::Utc::now();
    let nanos = now.timestamp_subsec_nanos() as u64;
    Timestamp {
      seconds: now.timestamp() as i32,
      fraction: ((nanos << 32) / 1_000_000_000) as u32,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  serialization_test!( type = Timestamp,
  {
      time_zero,
      Timestamp::ZERO,
      le = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
      be = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
  },
  {
      time_invalid,
      Timestamp::INVALID,
      le = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
      be = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
  },
  {
      time_infinite,
      Timestamp::INFINITE,
      le = [0xFF, 0xFF, 0xFF, 0x7F, 0xFF, 0xFF, 0xFF, 0xFF],
      be = [0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
  },
  {
      time_current_empty_fraction,
      Timestamp { seconds: 1_537_045_491, fraction: 0 },
      le = [0xF3, 0x73, 0x9D, 0x5B, 0x00, 0x00, 0x00, 0x00],
      be = [0x5B, 0x9D, 0x73, 0xF3, 0x00, 0x00, 0x00, 0x00]
  });
}
