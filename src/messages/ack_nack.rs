use speedy::{Readable, Writable};

use crate::structure::guid::EntityId;
use crate::structure::sequence_number::SequenceNumberSet;

/// Communicates the state of a Reader to a Writer: everything below
/// `reader_sn_state.base` is positively acknowledged, the sequence
/// numbers in the set are requested for retransmission. The FINAL flag
/// asks the writer not to answer with a heartbeat.
#[derive(Debug, PartialEq, Eq, Clone, Readable, Writable)]
pub struct AckNack {
  /// The acknowledging Reader.
  pub reader_id: EntityId,

  /// The Writer being acknowledged or asked to re-send.
  pub writer_id: EntityId,

  /// Base = next expected sequence number; set bits = missing.
  pub reader_sn_state: SequenceNumberSet,

  /// Incremented per ACKNACK so the writer can discard duplicates
  /// arriving over redundant paths.
  pub count: i32,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::structure::sequence_number::SequenceNumber;

  serialization_test!( type = AckNack,
  {
      acknack_empty,
      AckNack {
          reader_id: EntityId::SEDP_BUILTIN_PUBLICATIONS_READER,
          writer_id: EntityId::SEDP_BUILTIN_PUBLICATIONS_WRITER,
          reader_sn_state: SequenceNumberSet::new_empty(SequenceNumber::zero()),
          count: 1,
      },
      le = [0x00, 0x00, 0x03, 0xC7,
            0x00, 0x00, 0x03, 0xC2,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00],
      be = [0x00, 0x00, 0x03, 0xC7,
            0x00, 0x00, 0x03, 0xC2,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x01]
  });
}
