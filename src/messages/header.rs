use speedy::{Readable, Writable};

use crate::messages::protocol_id::ProtocolId;
use crate::messages::protocol_version::ProtocolVersion;
use crate::messages::vendor_id::VendorId;
use crate::structure::guid::GuidPrefix;

/// The 20-byte header opening every RTPS message: magic, protocol
/// version, vendor id and the sender's GuidPrefix.
#[derive(Debug, PartialEq, Eq, Clone, Readable, Writable)]
pub struct Header {
  pub protocol_id: ProtocolId,
  pub protocol_version: ProtocolVersion,
  pub vendor_id: VendorId,
  pub guid_prefix: GuidPrefix,
}

impl Header {
  pub const SERIALIZED_SIZE: usize = 20;

  pub fn new(guid_prefix: GuidPrefix, vendor_id: VendorId) -> Header {
    Header {
      protocol_id: ProtocolId::PROTOCOL_RTPS,
      protocol_version: ProtocolVersion::THIS_IMPLEMENTATION,
      vendor_id,
      guid_prefix,
    }
  }

  /// A message is acceptable when the magic matches and the sender's
  /// major version is not newer than ours.
  pub fn valid(&self) -> bool {
    self.protocol_id == ProtocolId::PROTOCOL_RTPS
      && self.protocol_version.major <= ProtocolVersion::THIS_IMPLEMENTATION.major
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn header_rejects_newer_major_version() {
    let mut header = Header::new(GuidPrefix::UNKNOWN, VendorId::VENDOR_UNKNOWN);
    assert!(header.valid());

    header.protocol_version.major += 1;
    assert!(!header.valid());
  }

  serialization_test!( type = Header,
  {
      header_with_unknown_guid_prefix,
      Header::new(GuidPrefix::UNKNOWN, VendorId::VENDOR_UNKNOWN),
      le = [0x52, 0x54, 0x50, 0x53, // protocol_id
            0x02, 0x02,             // protocol_version
            0x00, 0x00,             // vendor_id
            0x00, 0x00, 0x00, 0x00, // guid_prefix
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00],
      be = [0x52, 0x54, 0x50, 0x53,
            0x02, 0x02,
            0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00]
  });
}
