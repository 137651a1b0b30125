use std::ops::{Add, Sub};

use speedy::{Context, Readable, Reader, Writable, Writer};

/// 64-bit sequence number of a change, unique within its writer.
/// Transmitted as a (high: i32, low: u32) pair.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SequenceNumber {
  value: i64,
}

impl SequenceNumber {
  pub const UNKNOWN: SequenceNumber = SequenceNumber {
    value: (u32::MAX as i64) << 32, // high = -1, low = 0
  };

  pub fn new(value: i64) -> Self {
    Self { value }
  }

  pub const fn zero() -> Self {
    Self { value: 0 }
  }

  pub fn next(self) -> Self {
    Self {
      value: self.value + 1,
    }
  }
}

impl From<i64> for SequenceNumber {
  fn from(value: i64) -> Self {
    SequenceNumber { value }
  }
}

impl From<SequenceNumber> for i64 {
  fn from(sequence_number: SequenceNumber) -> Self {
    sequence_number.value
  }
}

impl Add<i64> for SequenceNumber {
  type Output = SequenceNumber;

  fn add(self, other: i64) -> SequenceNumber {
    SequenceNumber {
      value: self.value + other,
    }
  }
}

impl Sub<SequenceNumber> for SequenceNumber {
  type Output = i64;

  fn sub(self, other: SequenceNumber) -> i64 {
    self.value - other.value
  }
}

impl Default for SequenceNumber {
  /// Writers number their first change 1.
  fn default() -> SequenceNumber {
    SequenceNumber { value: 1 }
  }
}

impl<'a, C: Context> Readable<'a, C> for SequenceNumber {
  #[inline]
  fn read_from<R: Reader<'a, C>>(reader: &mut R) -> Result<Self, C::Error> {
    let high: i32 = reader.read_value()?;
    let low: u32 = reader.read_value()?;

    Ok(SequenceNumber {
      value: (i64::from(high) << 32) + i64::from(low),
    })
  }

  #[inline]
  fn minimum_bytes_needed() -> usize {
    8
  }
}

impl<C: Context> Writable<C> for SequenceNumber {
  #[inline]
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    writer.write_i32((self.value >> 32) as i32)?;
    writer.write_u32(self.value as u32)?;
    Ok(())
  }
}

/// Compact set of sequence numbers within a 256-wide window above a base,
/// as carried in ACKNACK. Bit *i* of the bitmap refers to `base + i`;
/// within each 32-bit word the most significant bit is bit 0, per the
/// RTPS PSM.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SequenceNumberSet {
  bitmap_base: SequenceNumber,
  num_bits: u32,
  bitmap: Vec<u32>,
}

impl SequenceNumberSet {
  pub const MAX_BITS: u32 = 256;

  pub fn new_empty(bitmap_base: SequenceNumber) -> Self {
    Self {
      bitmap_base,
      num_bits: 0,
      bitmap: Vec::new(),
    }
  }

  pub fn base(&self) -> SequenceNumber {
    self.bitmap_base
  }

  pub fn is_empty(&self) -> bool {
    self.iter().next().is_none()
  }

  /// Inserts `sn` if it falls inside `[base, base + 255]`; returns
  /// whether it did.
  pub fn insert(&mut self, sn: SequenceNumber) -> bool {
    if sn < self.bitmap_base {
      return false;
    }
    let offset = sn - self.bitmap_base;
    if offset >= i64::from(Self::MAX_BITS) {
      return false;
    }
    let offset = offset as u32;
    if offset >= self.num_bits {
      self.num_bits = offset + 1;
      self.bitmap.resize(self.num_bits.div_ceil(32) as usize, 0);
    }
    self.bitmap[(offset / 32) as usize] |= 1 << (31 - (offset % 32));
    true
  }

  pub fn contains(&self, sn: SequenceNumber) -> bool {
    if sn < self.bitmap_base {
      return false;
    }
    let offset = sn - self.bitmap_base;
    if offset >= i64::from(self.num_bits) {
      return false;
    }
    let offset = offset as u32;
    self.bitmap[(offset / 32) as usize] & (1 << (31 - (offset % 32))) != 0
  }

  /// Set members in ascending order.
  pub fn iter(&self) -> impl Iterator<Item = SequenceNumber> + '_ {
    let base = self.bitmap_base;
    (0..self.num_bits)
      .filter(move |offset| self.bitmap[(offset / 32) as usize] & (1 << (31 - (offset % 32))) != 0)
      .map(move |offset| base + i64::from(offset))
  }
}

impl<'a, C: Context> Readable<'a, C> for SequenceNumberSet {
  fn read_from<R: Reader<'a, C>>(reader: &mut R) -> Result<Self, C::Error> {
    let bitmap_base: SequenceNumber = reader.read_value()?;
    let num_bits: u32 = reader.read_value()?;
    // An absurd numBits cannot allocate more than the buffer backs:
    // the word reads below fail at end-of-input first.
    let word_count = num_bits.div_ceil(32) as usize;
    let mut bitmap = Vec::with_capacity(word_count.min(8));
    for _ in 0..word_count {
      bitmap.push(reader.read_u32()?);
    }
    Ok(SequenceNumberSet {
      bitmap_base,
      num_bits,
      bitmap,
    })
  }

  #[inline]
  fn minimum_bytes_needed() -> usize {
    12
  }
}

impl<C: Context> Writable<C> for SequenceNumberSet {
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    writer.write_value(&self.bitmap_base)?;
    writer.write_u32(self.num_bits)?;
    for word in &self.bitmap {
      writer.write_u32(*word)?;
    }
    Ok(())
  }
}
