use speedy::{Readable, Writable};

/// Wire representation of a time span (lease durations in SPDP): whole
/// seconds plus a 1/2^32 fractional part.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Readable, Writable)]
pub struct Duration {
  pub seconds: i32,
  pub fraction: u32,
}

impl Duration {
  pub const ZERO: Duration = Duration {
    seconds: 0,
    fraction: 0,
  };
  pub const INVALID: Duration = Duration {
    seconds: -1,
    fraction: 0xFFFF_FFFF,
  };
  pub const INFINITE: Duration = Duration {
    seconds: 0x7FFF_FFFF,
    fraction: 0xFFFF_FFFF,
  };

  pub fn from_std(d: std::time::Duration) -> Duration {
    Duration {
      seconds: d.as_secs() as i32,
      fraction: ((u64::from(d.subsec_nanos()) << 32) / 1_000_000_000) as u32,
    }
  }
}
