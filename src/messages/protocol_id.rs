use speedy::{Context, Readable, Reader, Writable, Writer};

/// The "RTPS" magic opening every message.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProtocolId {
  magic: [u8; 4],
}

impl ProtocolId {
  pub const PROTOCOL_RTPS: ProtocolId = ProtocolId { magic: *b"RTPS" };
}

impl Default for ProtocolId {
  fn default() -> Self {
    ProtocolId::PROTOCOL_RTPS
  }
}

impl<'a, C: Context> Readable<'a, C> for ProtocolId {
  #[inline]
  fn read_from<R: Reader<'a, C>>(reader: &mut R) -> Result<Self, C::Error> {
    let mut magic = [0u8; 4];
    reader.read_bytes(&mut magic)?;
    Ok(ProtocolId { magic })
  }

  #[inline]
  fn minimum_bytes_needed() -> usize {
    4
  }
}

impl<C: Context> Writable<C> for ProtocolId {
  #[inline]
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    writer.write_bytes(&self.magic)
  }
}
