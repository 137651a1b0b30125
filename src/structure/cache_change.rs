use bytes::Bytes;

use crate::structure::guid::Guid;
use crate::structure::sequence_number::SequenceNumber;

/// Lifecycle of the data-object a change refers to.
#[derive(Copy, Clone, Debug, PartialOrd, PartialEq, Ord, Eq)]
#[allow(non_camel_case_types)]
pub enum ChangeKind {
  ALIVE,
  NOT_ALIVE_DISPOSED,
  NOT_ALIVE_UNREGISTERED,
}

/// One published sample as stored in a writer history: the change kind,
/// the writer it belongs to, its sequence number and the serialized
/// payload bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheChange {
  pub kind: ChangeKind,
  pub writer_guid: Guid,
  pub sequence_number: SequenceNumber,
  pub data_value: Bytes,
}

impl CacheChange {
  pub fn new(
    kind: ChangeKind,
    writer_guid: Guid,
    sequence_number: SequenceNumber,
    data_value: Bytes,
  ) -> CacheChange {
    CacheChange {
      kind,
      writer_guid,
      sequence_number,
      data_value,
    }
  }
}
