use speedy::{Context, Endianness, Readable, Writable, Writer};

use crate::error::MessageError;
use crate::serialization::parameter::Parameter;
use crate::structure::parameter_id::ParameterId;

/// A PID_SENTINEL-terminated sequence of [`Parameter`]s.
///
/// The decoder keeps unknown parameter ids (callers interpret what they
/// know and ignore the rest) and bounds every length by the remaining
/// buffer, as required of RTPS decoders.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct ParameterList {
  pub parameters: Vec<Parameter>,
}

impl ParameterList {
  pub fn new() -> ParameterList {
    ParameterList {
      parameters: Vec::new(),
    }
  }

  pub fn push(&mut self, parameter: Parameter) {
    self.parameters.push(parameter);
  }

  /// First parameter with the given id, if any.
  pub fn find(&self, id: ParameterId) -> Option<&Parameter> {
    self.parameters.iter().find(|p| p.parameter_id == id)
  }

  /// All parameters with the given id, in order of appearance.
  pub fn find_all<'a>(&'a self, id: ParameterId) -> impl Iterator<Item = &'a Parameter> + 'a {
    self.parameters.iter().filter(move |p| p.parameter_id == id)
  }

  /// Decodes a parameter list from the front of `buffer`, returning the
  /// list and the number of bytes consumed (including the sentinel).
  pub fn read_from_bytes(
    buffer: &[u8],
    endianness: Endianness,
  ) -> Result<(ParameterList, usize), MessageError> {
    let mut parameters = Vec::new();
    let mut pos = 0;
    loop {
      if pos + 4 > buffer.len() {
        return Err(MessageError::malformed(
          "parameter list ended without sentinel",
        ));
      }
      let parameter_id =
        ParameterId::read_from_buffer_with_ctx(endianness, &buffer[pos..pos + 2])
          .map_err(|e| MessageError::malformed(format!("parameter id: {e}")))?;
      let length = u16::read_from_buffer_with_ctx(endianness, &buffer[pos + 2..pos + 4])
        .map_err(|e| MessageError::malformed(format!("parameter length: {e}")))? as usize;
      pos += 4;

      if parameter_id == ParameterId::PID_SENTINEL {
        return Ok((ParameterList { parameters }, pos));
      }

      // Lengths on the wire are 4-byte aligned already; round up
      // defensively and bound by what is actually left.
      let padded = (length + 3) & !3;
      if pos + padded > buffer.len() {
        return Err(MessageError::ParameterOverrun {
          length: padded,
          remaining: buffer.len() - pos,
        });
      }
      parameters.push(Parameter::new(
        parameter_id,
        buffer[pos..pos + length].to_vec(),
      ));
      pos += padded;
    }
  }
}

impl<C: Context> Writable<C> for ParameterList {
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    for parameter in &self.parameters {
      writer.write_value(parameter)?;
    }
    // PID_SENTINEL, length 0
    writer.write_value(&ParameterId::PID_SENTINEL)?;
    writer.write_u16(0)?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use speedy::Writable;

  use super::*;

  fn sample_list() -> ParameterList {
    let mut list = ParameterList::new();
    list.push(Parameter::new(
      ParameterId::PID_TOPIC_NAME,
      vec![0x01, 0x02, 0x03],
    ));
    list.push(Parameter::new(
      ParameterId::PID_VENDOR_ID,
      vec![0x01, 0x0F],
    ));
    list
  }

  #[test]
  fn round_trip_little_endian() {
    let list = sample_list();
    let encoded = list
      .write_to_vec_with_ctx(Endianness::LittleEndian)
      .unwrap();
    let (decoded, consumed) =
      ParameterList::read_from_bytes(&encoded, Endianness::LittleEndian).unwrap();
    assert_eq!(consumed, encoded.len());
    // values come back padded-trimmed to their declared lengths, which
    // the encoder aligned to 4
    assert_eq!(decoded.parameters.len(), 2);
    assert_eq!(
      decoded.parameters[0].value,
      vec![0x01, 0x02, 0x03, 0x00]
    );
    assert_eq!(
      decoded.parameters[1].value,
      vec![0x01, 0x0F, 0x00, 0x00]
    );
  }

  #[test]
  fn unknown_parameter_ids_are_kept_not_fatal() {
    // pid 0x7777 is nothing we know; decoder must skip over it
    let bytes = [
      0x77, 0x77, 0x04, 0x00, 0xDE, 0xAD, 0xBE, 0xEF, // unknown
      0x01, 0x00, 0x00, 0x00, // sentinel
    ];
    let (decoded, consumed) =
      ParameterList::read_from_bytes(&bytes, Endianness::LittleEndian).unwrap();
    assert_eq!(consumed, bytes.len());
    assert_eq!(decoded.parameters.len(), 1);
  }

  #[test]
  fn overrunning_length_is_an_error() {
    let bytes = [
      0x05, 0x00, 0xFF, 0x00, 0x01, 0x02, // declared 255, only 2 present
    ];
    assert!(ParameterList::read_from_bytes(&bytes, Endianness::LittleEndian).is_err());
  }

  #[test]
  fn missing_sentinel_is_an_error() {
    let bytes = [0x05, 0x00, 0x04, 0x00, 0x01, 0x02, 0x03, 0x04];
    assert!(ParameterList::read_from_bytes(&bytes, Endianness::LittleEndian).is_err());
  }
}
