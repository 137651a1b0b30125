use bytes::Bytes;
use enumflags2::BitFlags;
#[allow(unused_imports)]
use log::{debug, error, trace, warn};
use speedy::{Endianness, Readable, Writable};

use crate::error::MessageError;
use crate::messages::ack_nack::AckNack;
use crate::messages::data::Data;
use crate::messages::header::Header;
use crate::messages::heartbeat::Heartbeat;
use crate::messages::info_destination::InfoDestination;
use crate::messages::info_timestamp::InfoTimestamp;
use crate::messages::submessage::*;
use crate::messages::submessage_flag::*;
use crate::messages::submessage_header::SubmessageHeader;
use crate::messages::submessage_kind::SubmessageKind;
use crate::messages::vendor_id::VendorId;
use crate::structure::guid::{EntityId, GuidPrefix};
use crate::structure::sequence_number::{SequenceNumber, SequenceNumberSet};
use crate::structure::time::Timestamp;

/// A whole RTPS message: header plus the parsed submessage sequence.
#[derive(Debug, Clone)]
pub struct Message {
  pub header: Header,
  pub submessages: Vec<Submessage>,
}

impl Message {
  /// Parses one datagram. Speedy's `Readable` cannot be used at this
  /// level because each submessage chooses its own endianness at run
  /// time; the header is fixed-layout and the loop re-reads each body
  /// with the endianness its flags announce.
  pub fn read_from_buffer(buffer: &Bytes) -> Result<Message, MessageError> {
    if buffer.len() < Header::SERIALIZED_SIZE {
      return Err(MessageError::malformed("shorter than RTPS header"));
    }
    let header =
      Header::read_from_buffer_with_ctx(Endianness::LittleEndian, &buffer[..Header::SERIALIZED_SIZE])
        .map_err(|e| MessageError::malformed(format!("header: {e}")))?;
    if !header.valid() {
      return Err(MessageError::malformed(
        "bad magic or unsupported protocol version",
      ));
    }

    let mut message = Message {
      header,
      submessages: Vec::new(),
    };
    let mut submessages_left = buffer.slice(Header::SERIALIZED_SIZE..);

    while !submessages_left.is_empty() {
      if submessages_left.len() < SubmessageHeader::SERIALIZED_SIZE {
        return Err(MessageError::malformed("truncated submessage header"));
      }
      let kind = SubmessageKind::from_u8(submessages_left[0]);
      let flags = submessages_left[1];
      let endianness = endianness_flag(flags);
      let declared_length =
        u16::read_from_buffer_with_ctx(endianness, &submessages_left[2..4])
          .map_err(|e| MessageError::malformed(format!("submessage length: {e}")))? as usize;

      // Length 0 means "extends to the end of the message", except for
      // PAD and INFO_TS, which may genuinely be empty.
      let content_length = if declared_length == 0
        && kind != SubmessageKind::PAD
        && kind != SubmessageKind::INFO_TS
      {
        submessages_left.len() - SubmessageHeader::SERIALIZED_SIZE
      } else {
        declared_length
      };

      if SubmessageHeader::SERIALIZED_SIZE + content_length > submessages_left.len() {
        return Err(MessageError::malformed(
          "submessage length overruns datagram",
        ));
      }

      let mut sub_buffer =
        submessages_left.split_to(SubmessageHeader::SERIALIZED_SIZE + content_length);
      let sub_content = sub_buffer.split_off(SubmessageHeader::SERIALIZED_SIZE);

      let sub_header = SubmessageHeader {
        kind,
        flags,
        content_length: content_length as u16,
      };

      let malformed = |e: speedy::Error| MessageError::malformed(format!("{kind:?}: {e}"));

      let body = match kind {
        SubmessageKind::DATA => {
          let f = BitFlags::<DATA_Flags>::from_bits_truncate(flags);
          SubmessageBody::Entity(EntitySubmessage::Data(
            Data::deserialize_data(&sub_content, f)?,
            f,
          ))
        }
        SubmessageKind::HEARTBEAT => {
          let f = BitFlags::<HEARTBEAT_Flags>::from_bits_truncate(flags);
          SubmessageBody::Entity(EntitySubmessage::Heartbeat(
            Heartbeat::read_from_buffer_with_ctx(endianness, &sub_content).map_err(malformed)?,
            f,
          ))
        }
        SubmessageKind::ACKNACK => {
          let f = BitFlags::<ACKNACK_Flags>::from_bits_truncate(flags);
          SubmessageBody::Entity(EntitySubmessage::AckNack(
            AckNack::read_from_buffer_with_ctx(endianness, &sub_content).map_err(malformed)?,
            f,
          ))
        }
        SubmessageKind::INFO_TS => {
          let f = BitFlags::<INFOTIMESTAMP_Flags>::from_bits_truncate(flags);
          let timestamp = if f.contains(INFOTIMESTAMP_Flags::Invalidate) {
            None
          } else {
            Some(
              Timestamp::read_from_buffer_with_ctx(endianness, &sub_content).map_err(malformed)?,
            )
          };
          SubmessageBody::Interpreter(InterpreterSubmessage::InfoTimestamp(
            InfoTimestamp { timestamp },
            f,
          ))
        }
        SubmessageKind::INFO_DST => {
          let f = BitFlags::<INFODESTINATION_Flags>::from_bits_truncate(flags);
          SubmessageBody::Interpreter(InterpreterSubmessage::InfoDestination(
            InfoDestination::read_from_buffer_with_ctx(endianness, &sub_content)
              .map_err(malformed)?,
            f,
          ))
        }
        SubmessageKind::PAD => continue,
        unknown => {
          // Anything unmapped is skipped over via its length field.
          trace!("skipping unknown submessage kind {unknown:?}");
          continue;
        }
      };

      message.submessages.push(Submessage {
        header: sub_header,
        body,
      });
    }

    Ok(message)
  }
}

/// Serializes outbound messages: header first, then submessages in call
/// order, each little-endian with the endianness flag set and its
/// length patched into the submessage header.
pub struct MessageBuilder {
  buffer: Vec<u8>,
}

impl MessageBuilder {
  const ENDIANNESS: Endianness = Endianness::LittleEndian;

  pub fn new(guid_prefix: GuidPrefix, vendor_id: VendorId) -> MessageBuilder {
    let header = Header::new(guid_prefix, vendor_id);
    let buffer = header
      .write_to_vec_with_ctx(Self::ENDIANNESS)
      .unwrap_or_else(|e| {
        // Writing fixed-size fields into a Vec cannot fail.
        error!("RTPS header serialization failed: {e}");
        Vec::new()
      });
    MessageBuilder { buffer }
  }

  pub fn info_ts(mut self, timestamp: Option<Timestamp>) -> Self {
    let mut flags = BitFlags::<INFOTIMESTAMP_Flags>::from_endianness(Self::ENDIANNESS);
    let content = match timestamp {
      Some(ts) => match ts.write_to_vec_with_ctx(Self::ENDIANNESS) {
        Ok(bytes) => bytes,
        Err(e) => {
          error!("INFO_TS serialization failed: {e}");
          return self;
        }
      },
      None => {
        flags |= INFOTIMESTAMP_Flags::Invalidate;
        Vec::new()
      }
    };
    self.push_submessage(SubmessageKind::INFO_TS, flags.bits(), &content);
    self
  }

  pub fn info_dst(mut self, guid_prefix: GuidPrefix) -> Self {
    let flags = BitFlags::<INFODESTINATION_Flags>::from_endianness(Self::ENDIANNESS);
    match (InfoDestination { guid_prefix }).write_to_vec_with_ctx(Self::ENDIANNESS) {
      Ok(content) => self.push_submessage(SubmessageKind::INFO_DST, flags.bits(), &content),
      Err(e) => error!("INFO_DST serialization failed: {e}"),
    }
    self
  }

  pub fn data(
    mut self,
    reader_id: EntityId,
    writer_id: EntityId,
    writer_sn: SequenceNumber,
    payload: Option<Bytes>,
  ) -> Self {
    let mut flags = BitFlags::<DATA_Flags>::from_endianness(Self::ENDIANNESS);
    if payload.is_some() {
      flags |= DATA_Flags::Data;
    }
    let data = Data::new(reader_id, writer_id, writer_sn, payload);
    match data.write_to_vec_with_ctx(Self::ENDIANNESS) {
      Ok(content) => self.push_submessage(SubmessageKind::DATA, flags.bits(), &content),
      Err(e) => error!("DATA serialization failed: {e}"),
    }
    self
  }

  #[allow(clippy::too_many_arguments)]
  pub fn heartbeat(
    mut self,
    reader_id: EntityId,
    writer_id: EntityId,
    first_sn: SequenceNumber,
    last_sn: SequenceNumber,
    count: i32,
    final_flag: bool,
  ) -> Self {
    let mut flags = BitFlags::<HEARTBEAT_Flags>::from_endianness(Self::ENDIANNESS);
    if final_flag {
      flags |= HEARTBEAT_Flags::Final;
    }
    let heartbeat = Heartbeat {
      reader_id,
      writer_id,
      first_sn,
      last_sn,
      count,
    };
    match heartbeat.write_to_vec_with_ctx(Self::ENDIANNESS) {
      Ok(content) => self.push_submessage(SubmessageKind::HEARTBEAT, flags.bits(), &content),
      Err(e) => error!("HEARTBEAT serialization failed: {e}"),
    }
    self
  }

  pub fn acknack(
    mut self,
    reader_id: EntityId,
    writer_id: EntityId,
    reader_sn_state: SequenceNumberSet,
    count: i32,
    final_flag: bool,
  ) -> Self {
    let mut flags = BitFlags::<ACKNACK_Flags>::from_endianness(Self::ENDIANNESS);
    if final_flag {
      flags |= ACKNACK_Flags::Final;
    }
    let acknack = AckNack {
      reader_id,
      writer_id,
      reader_sn_state,
      count,
    };
    match acknack.write_to_vec_with_ctx(Self::ENDIANNESS) {
      Ok(content) => self.push_submessage(SubmessageKind::ACKNACK, flags.bits(), &content),
      Err(e) => error!("ACKNACK serialization failed: {e}"),
    }
    self
  }

  pub fn take(self) -> Bytes {
    Bytes::from(self.buffer)
  }

  fn push_submessage(&mut self, kind: SubmessageKind, flags: u8, content: &[u8]) {
    self.buffer.push(kind.as_u8());
    self.buffer.push(flags);
    self
      .buffer
      .extend_from_slice(&(content.len() as u16).to_le_bytes());
    self.buffer.extend_from_slice(content);
  }
}
