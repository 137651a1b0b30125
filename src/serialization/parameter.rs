use speedy::{Context, Writable, Writer};

use crate::structure::parameter_id::ParameterId;

/// One (id, length, value) element of a parameter list. The length on
/// the wire is the value padded to a 4-byte boundary.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Parameter {
  pub parameter_id: ParameterId,
  pub value: Vec<u8>,
}

impl Parameter {
  pub fn new(parameter_id: ParameterId, value: Vec<u8>) -> Parameter {
    Parameter {
      parameter_id,
      value,
    }
  }

  pub(crate) fn padded_len(&self) -> usize {
    (self.value.len() + 3) & !3
  }
}

impl<C: Context> Writable<C> for Parameter {
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    writer.write_value(&self.parameter_id)?;
    writer.write_u16(self.padded_len() as u16)?;
    writer.write_bytes(&self.value)?;
    for _ in self.value.len()..self.padded_len() {
      writer.write_u8(0)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use speedy::{Endianness, Writable};

  use super::*;

  #[test]
  fn value_is_padded_to_four_bytes() {
    let parameter = Parameter::new(ParameterId::PID_TOPIC_NAME, vec![0xAA, 0xBB, 0xCC]);
    let encoded = parameter
      .write_to_vec_with_ctx(Endianness::LittleEndian)
      .unwrap();
    assert_eq!(
      encoded,
      vec![0x05, 0x00, 0x04, 0x00, 0xAA, 0xBB, 0xCC, 0x00]
    );
  }

  #[test]
  fn aligned_value_gets_no_padding() {
    let parameter = Parameter::new(ParameterId::PID_VENDOR_ID, vec![0x01, 0x0F, 0x00, 0x00]);
    let encoded = parameter
      .write_to_vec_with_ctx(Endianness::BigEndian)
      .unwrap();
    assert_eq!(
      encoded,
      vec![0x00, 0x16, 0x00, 0x04, 0x01, 0x0F, 0x00, 0x00]
    );
  }
}
