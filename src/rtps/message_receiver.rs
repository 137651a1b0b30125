use std::sync::Arc;

use bytes::Bytes;
#[allow(unused_imports)]
use log::{debug, trace, warn};

use crate::messages::message::Message;
use crate::messages::submessage::{EntitySubmessage, InterpreterSubmessage, SubmessageBody};
use crate::messages::submessage_flag::{ACKNACK_Flags, HEARTBEAT_Flags};
use crate::rtps::reader::{StatefulReader, StatelessReader};
use crate::rtps::stateful_writer::StatefulWriter;
use crate::rtps::stateless_writer::StatelessWriter;
use crate::structure::guid::{EntityId, GuidPrefix};
use crate::structure::time::Timestamp;

/// A reader endpoint as stored in the participant registry.
#[derive(Clone)]
pub(crate) enum LocalReader {
  Stateless(Arc<StatelessReader>),
  Stateful(Arc<StatefulReader>),
}

impl LocalReader {
  pub fn entity_id(&self) -> EntityId {
    match self {
      LocalReader::Stateless(r) => r.guid().entity_id,
      LocalReader::Stateful(r) => r.guid().entity_id,
    }
  }
}

/// A writer endpoint as stored in the participant registry.
#[derive(Clone)]
pub(crate) enum LocalWriter {
  Stateless(Arc<StatelessWriter>),
  Stateful(Arc<StatefulWriter>),
}

impl LocalWriter {
  pub fn entity_id(&self) -> EntityId {
    match self {
      LocalWriter::Stateless(w) => w.guid().entity_id,
      LocalWriter::Stateful(w) => w.guid().entity_id,
    }
  }

  pub fn progress(&self) {
    match self {
      LocalWriter::Stateless(w) => w.progress(),
      LocalWriter::Stateful(w) => w.progress(),
    }
  }
}

/// The submessage sequence interpreter: applies INFO_TS / INFO_DST
/// context and forwards entity submessages to the addressed endpoints.
/// One instance lives per processed message; the interpreter state is
/// reset by construction.
pub(crate) struct MessageReceiver<'a> {
  own_guid_prefix: GuidPrefix,
  readers: &'a [LocalReader],
  writers: &'a [LocalWriter],

  source_guid_prefix: GuidPrefix,
  dest_guid_prefix: GuidPrefix,
  source_timestamp: Option<Timestamp>,
}

impl<'a> MessageReceiver<'a> {
  pub fn new(
    own_guid_prefix: GuidPrefix,
    readers: &'a [LocalReader],
    writers: &'a [LocalWriter],
  ) -> Self {
    MessageReceiver {
      own_guid_prefix,
      readers,
      writers,
      source_guid_prefix: GuidPrefix::UNKNOWN,
      dest_guid_prefix: GuidPrefix::UNKNOWN,
      source_timestamp: None,
    }
  }

  /// Parses and routes one datagram. Malformed packets are dropped
  /// whole; nothing is surfaced to the caller.
  pub fn handle_packet(&mut self, buffer: &Bytes) {
    match Message::read_from_buffer(buffer) {
      Ok(message) => self.handle_parsed_message(message),
      Err(e) => {
        debug!("dropping undecodable packet: {e}");
      }
    }
  }

  pub fn handle_parsed_message(&mut self, message: Message) {
    self.source_guid_prefix = message.header.guid_prefix;
    self.dest_guid_prefix = self.own_guid_prefix;
    self.source_timestamp = None;

    for submessage in message.submessages {
      match submessage.body {
        SubmessageBody::Interpreter(interpreter) => self.apply_interpreter(interpreter),
        SubmessageBody::Entity(entity) => {
          if self.dest_guid_prefix != self.own_guid_prefix {
            trace!(
              "submessage for {:?}, not us ({:?})",
              self.dest_guid_prefix,
              self.own_guid_prefix
            );
            continue;
          }
          self.route_entity(entity);
        }
      }
    }
  }

  fn apply_interpreter(&mut self, submessage: InterpreterSubmessage) {
    match submessage {
      InterpreterSubmessage::InfoTimestamp(info_ts, _) => {
        self.source_timestamp = info_ts.timestamp;
      }
      InterpreterSubmessage::InfoDestination(info_dst, _) => {
        // UNKNOWN destination re-addresses to ourselves (broadcast).
        self.dest_guid_prefix = if info_dst.guid_prefix == GuidPrefix::UNKNOWN {
          self.own_guid_prefix
        } else {
          info_dst.guid_prefix
        };
      }
    }
  }

  fn route_entity(&self, submessage: EntitySubmessage) {
    match submessage {
      EntitySubmessage::Data(data, _flags) => {
        let targeted = data.reader_id;
        for reader in self.readers {
          if targeted != EntityId::UNKNOWN && reader.entity_id() != targeted {
            continue;
          }
          match reader {
            LocalReader::Stateless(r) => {
              r.handle_data(self.source_guid_prefix, &data, self.source_timestamp);
            }
            LocalReader::Stateful(r) => {
              r.handle_data(self.source_guid_prefix, &data, self.source_timestamp);
            }
          }
        }
      }
      EntitySubmessage::Heartbeat(heartbeat, flags) => {
        let final_flag = flags.contains(HEARTBEAT_Flags::Final);
        let targeted = heartbeat.reader_id;
        for reader in self.readers {
          if targeted != EntityId::UNKNOWN && reader.entity_id() != targeted {
            continue;
          }
          // Only stateful readers take part in the reliability protocol.
          if let LocalReader::Stateful(r) = reader {
            r.handle_heartbeat(self.source_guid_prefix, &heartbeat, final_flag);
          }
        }
      }
      EntitySubmessage::AckNack(acknack, flags) => {
        let final_flag = flags.contains(ACKNACK_Flags::Final);
        for writer in self.writers {
          if writer.entity_id() != acknack.writer_id {
            continue;
          }
          if let LocalWriter::Stateful(w) = writer {
            w.handle_acknack(self.source_guid_prefix, &acknack, final_flag);
          }
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;

  use super::*;
  use crate::messages::message::MessageBuilder;
  use crate::messages::vendor_id::VendorId;
  use crate::structure::guid::Guid;
  use crate::structure::reliability_kind::ReliabilityKind;
  use crate::structure::sequence_number::SequenceNumber;
  use crate::structure::topic_data::TopicData;
  use crate::structure::topic_kind::TopicKind;

  fn topic() -> TopicData {
    TopicData::new("chatter", "String", ReliabilityKind::BEST_EFFORT, TopicKind::NO_KEY)
  }

  fn own_prefix() -> GuidPrefix {
    GuidPrefix::new([1; 12])
  }

  fn peer_prefix() -> GuidPrefix {
    GuidPrefix::new([2; 12])
  }

  fn reader_with_counter() -> (LocalReader, Arc<AtomicUsize>) {
    let reader = StatelessReader::new(
      Guid::new(own_prefix(), EntityId::new_user_reader(1, false)),
      topic(),
      None,
    );
    reader.add_matched_writer(Guid::new(peer_prefix(), EntityId::new_user_writer(1, false)));
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    reader.set_listener(Box::new(move |_, _| {
      counter.fetch_add(1, Ordering::SeqCst);
    }));
    (LocalReader::Stateless(Arc::new(reader)), count)
  }

  fn data_message(dest: Option<GuidPrefix>) -> Bytes {
    let mut builder = MessageBuilder::new(peer_prefix(), VendorId::THIS_IMPLEMENTATION);
    if let Some(dest) = dest {
      builder = builder.info_dst(dest);
    }
    builder
      .data(
        EntityId::new_user_reader(1, false),
        EntityId::new_user_writer(1, false),
        SequenceNumber::from(1),
        Some(Bytes::from_static(b"hi")),
      )
      .take()
  }

  #[test]
  fn data_reaches_the_addressed_reader() {
    let (reader, count) = reader_with_counter();
    let readers = [reader];
    let mut receiver = MessageReceiver::new(own_prefix(), &readers, &[]);
    receiver.handle_packet(&data_message(None));
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn info_dst_for_another_participant_blocks_delivery() {
    let (reader, count) = reader_with_counter();
    let readers = [reader];
    let mut receiver = MessageReceiver::new(own_prefix(), &readers, &[]);
    receiver.handle_packet(&data_message(Some(GuidPrefix::new([9; 12]))));
    assert_eq!(count.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn info_dst_unknown_is_broadcast() {
    let (reader, count) = reader_with_counter();
    let readers = [reader];
    let mut receiver = MessageReceiver::new(own_prefix(), &readers, &[]);
    receiver.handle_packet(&data_message(Some(GuidPrefix::UNKNOWN)));
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn malformed_packet_changes_nothing() {
    let (reader, count) = reader_with_counter();
    let readers = [reader];
    let mut receiver = MessageReceiver::new(own_prefix(), &readers, &[]);

    let mut bytes = data_message(None).to_vec();
    bytes[0..4].copy_from_slice(b"RTPX");
    receiver.handle_packet(&Bytes::from(bytes));
    assert_eq!(count.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn info_ts_is_passed_to_the_callback() {
    let seen_ts = Arc::new(Mutex::new(None));
    let reader = StatelessReader::new(
      Guid::new(own_prefix(), EntityId::new_user_reader(1, false)),
      topic(),
      None,
    );
    reader.add_matched_writer(Guid::new(peer_prefix(), EntityId::new_user_writer(1, false)));
    let sink = Arc::clone(&seen_ts);
    reader.set_listener(Box::new(move |info, _| {
      *sink.lock().unwrap() = info.source_timestamp;
    }));
    let readers = [LocalReader::Stateless(Arc::new(reader))];

    let bytes = MessageBuilder::new(peer_prefix(), VendorId::THIS_IMPLEMENTATION)
      .info_ts(Some(Timestamp::ZERO))
      .data(
        EntityId::new_user_reader(1, false),
        EntityId::new_user_writer(1, false),
        SequenceNumber::from(1),
        None,
      )
      .take();
    let mut receiver = MessageReceiver::new(own_prefix(), &readers, &[]);
    receiver.handle_packet(&bytes);
    assert_eq!(*seen_ts.lock().unwrap(), Some(Timestamp::ZERO));
  }
}
