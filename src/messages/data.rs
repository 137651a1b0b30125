use bytes::Bytes;
use enumflags2::BitFlags;
use speedy::{Context, Readable, Writable, Writer};

use crate::error::MessageError;
use crate::messages::submessage_flag::{endianness_flag, DATA_Flags};
use crate::serialization::parameter_list::ParameterList;
use crate::structure::guid::EntityId;
use crate::structure::sequence_number::SequenceNumber;

/// Notifies a Reader of a change to a data-object of a Writer. Carries
/// the change's sequence number and, depending on the flags, an inline
/// QoS parameter list and the serialized payload.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Data {
  /// Target Reader, or `EntityId::UNKNOWN` for every matched reader.
  pub reader_id: EntityId,

  /// Writer that made the change.
  pub writer_id: EntityId,

  /// Position of the change in the writer's sequence.
  pub writer_sn: SequenceNumber,

  /// Present when the InlineQos flag is set.
  pub inline_qos: Option<ParameterList>,

  /// Present when the Data flag is set. Opaque to the protocol engine.
  pub serialized_payload: Option<Bytes>,
}

// Offset from the end of octets_to_inline_qos to the inline QoS:
// reader_id + writer_id + writer_sn.
const OCTETS_TO_INLINE_QOS: u16 = 4 + 4 + 8;

impl Data {
  pub fn new(
    reader_id: EntityId,
    writer_id: EntityId,
    writer_sn: SequenceNumber,
    serialized_payload: Option<Bytes>,
  ) -> Data {
    Data {
      reader_id,
      writer_id,
      writer_sn,
      inline_qos: None,
      serialized_payload,
    }
  }

  /// DATA cannot be a plain speedy `Readable`: the layout depends on
  /// the submessage flags, and `octets_to_inline_qos` may demand
  /// skipping bytes this version does not know about.
  pub fn deserialize_data(buffer: &Bytes, flags: BitFlags<DATA_Flags>) -> Result<Data, MessageError> {
    let endianness = endianness_flag(flags.bits());
    if buffer.len() < 20 {
      return Err(MessageError::malformed("DATA submessage too short"));
    }
    // extra_flags (2 bytes) is ignored per RTPS 2.x
    let octets_to_inline_qos =
      u16::read_from_buffer_with_ctx(endianness, &buffer[2..4])
        .map_err(|e| MessageError::malformed(format!("octetsToInlineQos: {e}")))? as usize;
    let reader_id = EntityId::read_from_buffer_with_ctx(endianness, &buffer[4..8])
      .map_err(|e| MessageError::malformed(format!("readerId: {e}")))?;
    let writer_id = EntityId::read_from_buffer_with_ctx(endianness, &buffer[8..12])
      .map_err(|e| MessageError::malformed(format!("writerId: {e}")))?;
    let writer_sn = SequenceNumber::read_from_buffer_with_ctx(endianness, &buffer[12..20])
      .map_err(|e| MessageError::malformed(format!("writerSN: {e}")))?;

    // octets_to_inline_qos counts from just after itself; larger values
    // mean header extensions to be skipped.
    let mut pos = 4 + octets_to_inline_qos;
    if pos > buffer.len() {
      return Err(MessageError::malformed(
        "octetsToInlineQos points past end of submessage",
      ));
    }

    let inline_qos = if flags.contains(DATA_Flags::InlineQos) {
      let (list, consumed) = ParameterList::read_from_bytes(&buffer[pos..], endianness)?;
      pos += consumed;
      Some(list)
    } else {
      None
    };

    let serialized_payload = if flags.contains(DATA_Flags::Data) || flags.contains(DATA_Flags::Key)
    {
      Some(buffer.slice(pos..))
    } else {
      None
    };

    Ok(Data {
      reader_id,
      writer_id,
      writer_sn,
      inline_qos,
      serialized_payload,
    })
  }
}

impl<C: Context> Writable<C> for Data {
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    writer.write_u16(0)?; // extra_flags, all zero in this protocol version
    writer.write_u16(OCTETS_TO_INLINE_QOS)?;
    writer.write_value(&self.reader_id)?;
    writer.write_value(&self.writer_id)?;
    writer.write_value(&self.writer_sn)?;
    if let Some(inline_qos) = &self.inline_qos {
      writer.write_value(inline_qos)?;
    }
    if let Some(payload) = &self.serialized_payload {
      writer.write_bytes(payload)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use speedy::Endianness;

  use super::*;
  use crate::structure::guid::EntityKind;

  fn payload_data() -> Data {
    Data::new(
      EntityId {
        entity_key: [0x00, 0x00, 0x01],
        entity_kind: EntityKind::BUILTIN_READER_WITH_KEY,
      },
      EntityId {
        entity_key: [0x00, 0x00, 0x01],
        entity_kind: EntityKind::BUILTIN_WRITER_WITH_KEY,
      },
      SequenceNumber::from(42),
      Some(Bytes::from_static(&[0xDE, 0xAD, 0xBE, 0xEF])),
    )
  }

  #[test]
  fn wire_round_trip_little_endian() {
    let data = payload_data();
    let encoded = data
      .write_to_vec_with_ctx(Endianness::LittleEndian)
      .unwrap();
    assert_eq!(
      encoded,
      vec![
        0x00, 0x00, // extraFlags
        0x10, 0x00, // octetsToInlineQos
        0x00, 0x00, 0x01, 0xC7, // readerId
        0x00, 0x00, 0x01, 0xC2, // writerId
        0x00, 0x00, 0x00, 0x00, 0x2A, 0x00, 0x00, 0x00, // writerSN (0, 42)
        0xDE, 0xAD, 0xBE, 0xEF, // payload
      ]
    );

    let flags = DATA_Flags::Endianness | DATA_Flags::Data;
    let decoded = Data::deserialize_data(&Bytes::from(encoded), flags).unwrap();
    assert_eq!(decoded, data);
  }

  #[test]
  fn data_without_payload_flag_has_no_payload() {
    let data = Data::new(
      EntityId::UNKNOWN,
      EntityId::SPDP_BUILTIN_PARTICIPANT_WRITER,
      SequenceNumber::from(1),
      None,
    );
    let encoded = data
      .write_to_vec_with_ctx(Endianness::LittleEndian)
      .unwrap();
    let decoded =
      Data::deserialize_data(&Bytes::from(encoded), DATA_Flags::Endianness.into()).unwrap();
    assert_eq!(decoded.serialized_payload, None);
  }

  #[test]
  fn truncated_data_is_malformed() {
    let short = Bytes::from_static(&[0x00, 0x00, 0x10, 0x00, 0x01]);
    assert!(Data::deserialize_data(&short, DATA_Flags::Endianness.into()).is_err());
  }

  #[test]
  fn overlong_octets_to_inline_qos_is_malformed() {
    let mut encoded = payload_data()
      .write_to_vec_with_ctx(Endianness::LittleEndian)
      .unwrap();
    encoded[2] = 0xFF; // octetsToInlineQos far past the end
    let flags = DATA_Flags::Endianness | DATA_Flags::Data;
    assert!(Data::deserialize_data(&Bytes::from(encoded), flags).is_err());
  }
}
