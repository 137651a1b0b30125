use speedy::{Context, Endianness, Readable, Reader, Writable, Writer};

/// The 2-byte encapsulation scheme opening a serialized payload,
/// followed on the wire by 2 reserved option bytes. Selects plain CDR
/// vs. parameter-list CDR and the payload endianness.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RepresentationIdentifier {
  bytes: [u8; 2],
}

impl RepresentationIdentifier {
  pub const CDR_BE: RepresentationIdentifier = RepresentationIdentifier {
    bytes: [0x00, 0x00],
  };
  pub const CDR_LE: RepresentationIdentifier = RepresentationIdentifier {
    bytes: [0x00, 0x01],
  };
  pub const PL_CDR_BE: RepresentationIdentifier = RepresentationIdentifier {
    bytes: [0x00, 0x02],
  };
  pub const PL_CDR_LE: RepresentationIdentifier = RepresentationIdentifier {
    bytes: [0x00, 0x03],
  };

  pub fn endianness(self) -> Endianness {
    // Odd second byte marks little-endian schemes.
    if self.bytes[1] & 0x01 != 0 {
      Endianness::LittleEndian
    } else {
      Endianness::BigEndian
    }
  }

  pub fn is_parameter_list(self) -> bool {
    self == Self::PL_CDR_BE || self == Self::PL_CDR_LE
  }
}

impl<'a, C: Context> Readable<'a, C> for RepresentationIdentifier {
  #[inline]
  fn read_from<R: Reader<'a, C>>(reader: &mut R) -> Result<Self, C::Error> {
    let mut bytes = [0u8; 2];
    reader.read_bytes(&mut bytes)?;
    Ok(RepresentationIdentifier { bytes })
  }

  #[inline]
  fn minimum_bytes_needed() -> usize {
    2
  }
}

impl<C: Context> Writable<C> for RepresentationIdentifier {
  #[inline]
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    writer.write_bytes(&self.bytes)
  }
}
