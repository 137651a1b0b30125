use speedy::{Readable, Writable};

use crate::messages::submessage_kind::SubmessageKind;

/// The 4-byte header in front of every submessage. `content_length`
/// counts the bytes after this header, in the endianness selected by
/// flag bit 0; 0 on the last submessage means "until end of message".
#[derive(Debug, PartialEq, Eq, Clone, Copy, Readable, Writable)]
pub struct SubmessageHeader {
  pub kind: SubmessageKind,
  pub flags: u8,
  pub content_length: u16,
}

impl SubmessageHeader {
  pub const SERIALIZED_SIZE: usize = 4;
}

#[cfg(test)]
mod tests {
  use super::*;

  serialization_test!( type = SubmessageHeader,
  {
      submessage_header_data,
      SubmessageHeader {
          kind: SubmessageKind::DATA,
          flags: 0x01,
          content_length: 42,
      },
      le = [0x15, 0x01, 0x2A, 0x00],
      be = [0x15, 0x01, 0x00, 0x2A]
  },
  {
      submessage_header_heartbeat_to_end_of_message,
      SubmessageHeader {
          kind: SubmessageKind::HEARTBEAT,
          flags: 0x00,
          content_length: 0,
      },
      le = [0x07, 0x00, 0x00, 0x00],
      be = [0x07, 0x00, 0x00, 0x00]
  });
}
