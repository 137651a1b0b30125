use speedy::{Readable, Writable};

use crate::structure::guid::EntityId;
use crate::structure::sequence_number::SequenceNumber;

/// Sent by a Writer to advertise the sequence numbers it can still
/// provide: `first_sn..=last_sn`. A heartbeat without the FINAL flag
/// obliges the reader to respond with an ACKNACK.
#[derive(Debug, PartialEq, Eq, Clone, Readable, Writable)]
pub struct Heartbeat {
  /// Target Reader; `EntityId::UNKNOWN` addresses all readers matched
  /// to the writer.
  pub reader_id: EntityId,

  /// The announcing Writer.
  pub writer_id: EntityId,

  /// Lowest sequence number still available for retransmission.
  pub first_sn: SequenceNumber,

  /// Highest sequence number written so far.
  pub last_sn: SequenceNumber,

  /// Incremented per heartbeat; readers discard stale or duplicate
  /// heartbeats by comparing counts.
  pub count: i32,
}

#[cfg(test)]
mod tests {
  use super::*;

  serialization_test!( type = Heartbeat,
  {
      heartbeat,
      Heartbeat {
          reader_id: EntityId::SEDP_BUILTIN_PUBLICATIONS_READER,
          writer_id: EntityId::SEDP_BUILTIN_PUBLICATIONS_WRITER,
          first_sn: SequenceNumber::from(42),
          last_sn: SequenceNumber::from(7),
          count: 9,
      },
      le = [0x00, 0x00, 0x03, 0xC7,
            0x00, 0x00, 0x03, 0xC2,
            0x00, 0x00, 0x00, 0x00,
            0x2A, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x07, 0x00, 0x00, 0x00,
            0x09, 0x00, 0x00, 0x00],
      be = [0x00, 0x00, 0x03, 0xC7,
            0x00, 0x00, 0x03, 0xC2,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x2A,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x07,
            0x00, 0x00, 0x00, 0x09]
  });
}
