use speedy::{Context, Readable, Reader, Writable, Writer};

/// Identifies the middleware vendor in the message header and in SPDP.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VendorId {
  pub vendor_id: [u8; 2],
}

impl VendorId {
  pub const VENDOR_UNKNOWN: VendorId = VendorId {
    vendor_id: [0x00; 2],
  };

  /// Vendor id stamped by this crate. 0x01, 0x0F belongs to no
  /// registered vendor.
  pub const THIS_IMPLEMENTATION: VendorId = VendorId {
    vendor_id: [0x01, 0x0F],
  };
}

impl Default for VendorId {
  fn default() -> Self {
    VendorId::VENDOR_UNKNOWN
  }
}

impl<'a, C: Context> Readable<'a, C> for VendorId {
  #[inline]
  fn read_from<R: Reader<'a, C>>(reader: &mut R) -> Result<Self, C::Error> {
    let mut vendor_id = [0u8; 2];
    reader.read_bytes(&mut vendor_id)?;
    Ok(VendorId { vendor_id })
  }

  #[inline]
  fn minimum_bytes_needed() -> usize {
    2
  }
}

impl<C: Context> Writable<C> for VendorId {
  #[inline]
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    writer.write_bytes(&self.vendor_id)
  }
}
