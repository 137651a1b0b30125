use bytes::Bytes;
#[allow(unused_imports)]
use log::{debug, trace, warn};
use speedy::{Endianness, Readable, Writable};

use crate::error::MessageError;
use crate::serialization::parameter::Parameter;
use crate::serialization::parameter_list::ParameterList;
use crate::serialization::representation_identifier::RepresentationIdentifier;
use crate::structure::guid::Guid;
use crate::structure::parameter_id::ParameterId;
use crate::structure::reliability_kind::ReliabilityKind;

/// One publication or subscription announcement exchanged over SEDP:
/// the endpoint's GUID, its topic and type names, and the reliability
/// it offers (writer) or requests (reader).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredEndpointData {
  pub endpoint_guid: Guid,
  pub topic_name: String,
  pub type_name: String,
  pub reliability: ReliabilityKind,
}

const ENCAPSULATION_HEADER_SIZE: usize = 4;

// CDR string: u32 length including the terminating NUL, then the bytes.
fn encode_cdr_string(s: &str, endianness: Endianness) -> Vec<u8> {
  let mut value = (s.len() as u32 + 1)
    .write_to_vec_with_ctx(endianness)
    .unwrap_or_default();
  value.extend_from_slice(s.as_bytes());
  value.push(0);
  value
}

fn decode_cdr_string(value: &[u8], endianness: Endianness) -> Result<String, MessageError> {
  if value.len() < 4 {
    return Err(MessageError::malformed("CDR string shorter than its length"));
  }
  let length = u32::read_from_buffer_with_ctx(endianness, &value[..4])
    .map_err(|e| MessageError::malformed(format!("CDR string length: {e}")))? as usize;
  if length == 0 || 4 + length > value.len() {
    return Err(MessageError::malformed("CDR string length out of bounds"));
  }
  let bytes = &value[4..4 + length - 1]; // drop the NUL
  String::from_utf8(bytes.to_vec())
    .map_err(|_| MessageError::malformed("CDR string is not UTF-8"))
}

impl DiscoveredEndpointData {
  pub fn new(
    endpoint_guid: Guid,
    topic_name: &str,
    type_name: &str,
    reliability: ReliabilityKind,
  ) -> Self {
    Self {
      endpoint_guid,
      topic_name: topic_name.to_string(),
      type_name: type_name.to_string(),
      reliability,
    }
  }

  pub fn to_pl_cdr_bytes(&self) -> Bytes {
    let endianness = Endianness::LittleEndian;
    let mut list = ParameterList::new();

    if let Ok(value) = self.endpoint_guid.write_to_vec_with_ctx(endianness) {
      list.push(Parameter::new(ParameterId::PID_ENDPOINT_GUID, value));
    }
    list.push(Parameter::new(
      ParameterId::PID_TOPIC_NAME,
      encode_cdr_string(&self.topic_name, endianness),
    ));
    list.push(Parameter::new(
      ParameterId::PID_TYPE_NAME,
      encode_cdr_string(&self.type_name, endianness),
    ));
    // ReliabilityQosPolicy: kind followed by max_blocking_time, which
    // this profile leaves zero.
    if let Ok(mut value) = self.reliability.write_to_vec_with_ctx(endianness) {
      value.extend_from_slice(&[0u8; 8]);
      list.push(Parameter::new(ParameterId::PID_RELIABILITY, value));
    }
    if let Ok(value) = self.endpoint_guid.write_to_vec_with_ctx(endianness) {
      list.push(Parameter::new(ParameterId::PID_KEY_HASH, value));
    }

    let mut buffer = RepresentationIdentifier::PL_CDR_LE
      .write_to_vec_with_ctx(endianness)
      .unwrap_or_default();
    buffer.extend_from_slice(&[0x00, 0x00]);
    match list.write_to_vec_with_ctx(endianness) {
      Ok(bytes) => buffer.extend_from_slice(&bytes),
      Err(e) => warn!("SEDP parameter list serialization failed: {e}"),
    }
    Bytes::from(buffer)
  }

  pub fn from_pl_cdr_bytes(buffer: &[u8]) -> Result<DiscoveredEndpointData, MessageError> {
    if buffer.len() < ENCAPSULATION_HEADER_SIZE {
      return Err(MessageError::malformed("payload shorter than encapsulation"));
    }
    let scheme =
      RepresentationIdentifier::read_from_buffer_with_ctx(Endianness::LittleEndian, &buffer[..2])
        .map_err(|e| MessageError::malformed(format!("encapsulation: {e}")))?;
    if !scheme.is_parameter_list() {
      return Err(MessageError::malformed("not a PL_CDR payload"));
    }
    let endianness = scheme.endianness();
    let (list, _) =
      ParameterList::read_from_bytes(&buffer[ENCAPSULATION_HEADER_SIZE..], endianness)?;

    let endpoint_guid = list
      .find(ParameterId::PID_ENDPOINT_GUID)
      .and_then(|p| Guid::read_from_buffer_with_ctx(endianness, &p.value).ok())
      .ok_or_else(|| MessageError::malformed("SEDP announcement without endpoint GUID"))?;
    let topic_name = list
      .find(ParameterId::PID_TOPIC_NAME)
      .ok_or_else(|| MessageError::malformed("SEDP announcement without topic name"))
      .and_then(|p| decode_cdr_string(&p.value, endianness))?;
    let type_name = list
      .find(ParameterId::PID_TYPE_NAME)
      .ok_or_else(|| MessageError::malformed("SEDP announcement without type name"))
      .and_then(|p| decode_cdr_string(&p.value, endianness))?;
    let reliability = list
      .find(ParameterId::PID_RELIABILITY)
      .and_then(|p| {
        (p.value.len() >= 4)
          .then(|| ReliabilityKind::read_from_buffer_with_ctx(endianness, &p.value[..4]).ok())
          .flatten()
      })
      .unwrap_or(ReliabilityKind::BEST_EFFORT);

    Ok(DiscoveredEndpointData {
      endpoint_guid,
      topic_name,
      type_name,
      reliability,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::structure::guid::{EntityId, GuidPrefix};

  fn sample() -> DiscoveredEndpointData {
    DiscoveredEndpointData::new(
      Guid::new(GuidPrefix::new([0x42; 12]), EntityId::new_user_writer(1, false)),
      "chatter",
      "std_msgs::msg::dds_::String_",
      ReliabilityKind::RELIABLE,
    )
  }

  #[test]
  fn announcement_round_trip() {
    let data = sample();
    let decoded = DiscoveredEndpointData::from_pl_cdr_bytes(&data.to_pl_cdr_bytes()).unwrap();
    assert_eq!(decoded, data);
  }

  #[test]
  fn cdr_string_encoding_includes_nul_and_length() {
    let encoded = encode_cdr_string("ab", Endianness::LittleEndian);
    assert_eq!(encoded, vec![0x03, 0x00, 0x00, 0x00, b'a', b'b', 0x00]);
    assert_eq!(
      decode_cdr_string(&encoded, Endianness::LittleEndian).unwrap(),
      "ab"
    );
  }

  #[test]
  fn truncated_string_is_malformed() {
    let bad = vec![0xFF, 0x00, 0x00, 0x00, b'a'];
    assert!(decode_cdr_string(&bad, Endianness::LittleEndian).is_err());
  }

  #[test]
  fn missing_topic_name_is_an_error() {
    let mut data = sample();
    data.topic_name.clear();
    // an empty topic name still encodes (length 1, just the NUL), so
    // build a payload without the parameter instead
    let endianness = Endianness::LittleEndian;
    let mut list = ParameterList::new();
    list.push(Parameter::new(
      ParameterId::PID_ENDPOINT_GUID,
      data.endpoint_guid.write_to_vec_with_ctx(endianness).unwrap(),
    ));
    let mut buffer = vec![0x00, 0x03, 0x00, 0x00];
    buffer.extend_from_slice(&list.write_to_vec_with_ctx(endianness).unwrap());
    assert!(DiscoveredEndpointData::from_pl_cdr_bytes(&buffer).is_err());
  }
}
