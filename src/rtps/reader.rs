use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
#[allow(unused_imports)]
use log::{debug, trace, warn};

use crate::messages::data::Data;
use crate::messages::heartbeat::Heartbeat;
use crate::messages::message::MessageBuilder;
use crate::messages::vendor_id::VendorId;
use crate::network::transport::Transport;
use crate::rtps::writer_proxy::{DataDisposition, RtpsWriterProxy};
use crate::structure::guid::{EntityId, Guid, GuidPrefix};
use crate::structure::locator::Locator;
use crate::structure::parameter_id::ParameterId;
use crate::structure::sequence_number::SequenceNumber;
use crate::structure::time::Timestamp;
use crate::structure::topic_data::TopicData;

/// Metadata handed to the sample callback along with the payload bytes.
#[derive(Debug, Clone)]
pub struct SampleInfo {
  pub writer_guid: Guid,
  pub sequence_number: SequenceNumber,
  pub source_timestamp: Option<Timestamp>,
  /// Key hash from inline QoS, when the writer sent one. Discovery uses
  /// it to identify disposed endpoints.
  pub key_hash: Option<[u8; 16]>,
}

/// The registered sample callback.
///
/// # Contract
///
/// The callback runs **with the reader's mutex held**, on a dispatcher
/// reader thread. It must not block and must not call back into the
/// same reader's API, or the participant deadlocks.
pub type SampleListener = Box<dyn FnMut(&SampleInfo, &[u8]) + Send>;

fn key_hash_of(data: &Data) -> Option<[u8; 16]> {
  let inline_qos = data.inline_qos.as_ref()?;
  let parameter = inline_qos.find(ParameterId::PID_KEY_HASH)?;
  let bytes: [u8; 16] = parameter.value.as_slice().try_into().ok()?;
  Some(bytes)
}

/// Best-effort reader without per-writer state: no gap repair, no
/// duplicate suppression, samples are delivered in arrival order.
pub struct StatelessReader {
  guid: Guid,
  topic: TopicData,
  inner: Mutex<StatelessReaderInner>,
}

struct StatelessReaderInner {
  listener: Option<SampleListener>,
  // Writers wired by discovery whose DATA this reader accepts.
  matched_writers: BTreeSet<Guid>,
  // Builtin pairing: accept this writer entity id from any participant
  // (the SPDP reader must hear writers it has not discovered yet).
  accept_writer_entity: Option<EntityId>,
}

impl StatelessReader {
  pub fn new(guid: Guid, topic: TopicData, accept_writer_entity: Option<EntityId>) -> Self {
    StatelessReader {
      guid,
      topic,
      inner: Mutex::new(StatelessReaderInner {
        listener: None,
        matched_writers: BTreeSet::new(),
        accept_writer_entity,
      }),
    }
  }

  pub fn guid(&self) -> Guid {
    self.guid
  }

  pub fn topic(&self) -> &TopicData {
    &self.topic
  }

  pub fn set_listener(&self, listener: SampleListener) {
    self.inner.lock().unwrap_or_else(|e| e.into_inner()).listener = Some(listener);
  }

  pub fn add_matched_writer(&self, writer_guid: Guid) {
    let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
    inner.matched_writers.insert(writer_guid);
  }

  pub fn remove_matched_writer(&self, writer_guid: Guid) {
    let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
    inner.matched_writers.remove(&writer_guid);
  }

  pub fn handle_data(&self, source_prefix: GuidPrefix, data: &Data, timestamp: Option<Timestamp>) {
    let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

    let addressed_to_us = data.reader_id == self.guid.entity_id;
    let broadcast_accepted = data.reader_id == EntityId::UNKNOWN
      && (inner.accept_writer_entity == Some(data.writer_id)
        || inner
          .matched_writers
          .contains(&Guid::new(source_prefix, data.writer_id)));
    if !addressed_to_us && !broadcast_accepted {
      return;
    }

    let info = SampleInfo {
      writer_guid: Guid::new(source_prefix, data.writer_id),
      sequence_number: data.writer_sn,
      source_timestamp: timestamp,
      key_hash: key_hash_of(data),
    };
    let payload = data.serialized_payload.clone().unwrap_or_else(Bytes::new);
    if let Some(listener) = inner.listener.as_mut() {
      listener(&info, &payload);
    }
  }
}

/// Reliable reader. Tracks one [`RtpsWriterProxy`] per matched writer
/// and answers heartbeats with ACKNACKs that request lost changes.
pub struct StatefulReader {
  guid: Guid,
  topic: TopicData,
  vendor_id: VendorId,
  transport: Arc<dyn Transport>,
  inner: Mutex<StatefulReaderInner>,
}

struct StatefulReaderInner {
  listener: Option<SampleListener>,
  matched_writers: BTreeMap<Guid, RtpsWriterProxy>,
}

impl StatefulReader {
  pub fn new(
    guid: Guid,
    topic: TopicData,
    transport: Arc<dyn Transport>,
    vendor_id: VendorId,
  ) -> Self {
    StatefulReader {
      guid,
      topic,
      vendor_id,
      transport,
      inner: Mutex::new(StatefulReaderInner {
        listener: None,
        matched_writers: BTreeMap::new(),
      }),
    }
  }

  pub fn guid(&self) -> Guid {
    self.guid
  }

  pub fn topic(&self) -> &TopicData {
    &self.topic
  }

  pub fn set_listener(&self, listener: SampleListener) {
    self.inner.lock().unwrap_or_else(|e| e.into_inner()).listener = Some(listener);
  }

  pub fn add_matched_writer(&self, proxy: RtpsWriterProxy) {
    let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
    debug!(
      "reader {:?} matched writer {:?}",
      self.guid, proxy.remote_writer_guid
    );
    inner.matched_writers.insert(proxy.remote_writer_guid, proxy);
  }

  pub fn remove_matched_writer(&self, writer_guid: Guid) {
    let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
    inner.matched_writers.remove(&writer_guid);
  }

  pub fn is_matched_to(&self, writer_guid: Guid) -> bool {
    let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
    inner.matched_writers.contains_key(&writer_guid)
  }

  /// DATA from an unknown writer is dropped; known writers go through
  /// duplicate suppression and gap bookkeeping.
  pub fn handle_data(&self, source_prefix: GuidPrefix, data: &Data, timestamp: Option<Timestamp>) {
    let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

    if data.reader_id != self.guid.entity_id && data.reader_id != EntityId::UNKNOWN {
      return;
    }
    let writer_guid = Guid::new(source_prefix, data.writer_id);
    let Some(proxy) = inner.matched_writers.get_mut(&writer_guid) else {
      debug!("DATA from unmatched writer {writer_guid:?}, dropped");
      return;
    };

    match proxy.handle_data_sn(data.writer_sn) {
      DataDisposition::Duplicate => {
        trace!("duplicate {:?} from {:?}", data.writer_sn, writer_guid);
      }
      DataDisposition::Deliver => {
        let info = SampleInfo {
          writer_guid,
          sequence_number: data.writer_sn,
          source_timestamp: timestamp,
          key_hash: key_hash_of(data),
        };
        let payload = data.serialized_payload.clone().unwrap_or_else(Bytes::new);
        if let Some(listener) = inner.listener.as_mut() {
          listener(&info, &payload);
        }
      }
    }
  }

  /// Count-gated heartbeat processing; answers with an ACKNACK to the
  /// writer's unicast locator unless a FINAL heartbeat found nothing
  /// missing.
  pub fn handle_heartbeat(
    &self,
    source_prefix: GuidPrefix,
    heartbeat: &Heartbeat,
    final_flag: bool,
  ) {
    let response: Option<(Locator, Bytes)> = {
      let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
      let writer_guid = Guid::new(source_prefix, heartbeat.writer_id);
      let Some(proxy) = inner.matched_writers.get_mut(&writer_guid) else {
        debug!("HEARTBEAT from unmatched writer {writer_guid:?}, dropped");
        return;
      };

      if !proxy.handle_heartbeat(heartbeat) {
        None // stale count: no ACKNACK at all
      } else {
        let missing = proxy.has_missing();
        if final_flag && !missing {
          None // FINAL means "no ack required"
        } else {
          let state = proxy.missing_sn_state();
          let count = proxy.next_acknack_count();
          let message = MessageBuilder::new(self.guid.prefix, self.vendor_id)
            .info_dst(source_prefix)
            .acknack(
              self.guid.entity_id,
              heartbeat.writer_id,
              state,
              count,
              !missing, // FINAL: pure ack needs no heartbeat in return
            )
            .take();
          Some((proxy.remote_locator, message))
        }
      }
    };
    // Transport is called only after the reader mutex is released.
    if let Some((locator, bytes)) = response {
      self.transport.send(&locator, &bytes);
    }
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex as StdMutex;

  use super::*;
  use crate::messages::message::Message;
  use crate::messages::submessage::{EntitySubmessage, SubmessageBody};
  use crate::structure::reliability_kind::ReliabilityKind;
  use crate::structure::topic_kind::TopicKind;
  use crate::thread_pool::PacketSink;

  /// Test transport that records outbound datagrams.
  #[derive(Default)]
  pub(crate) struct RecordingTransport {
    sent: StdMutex<Vec<(Locator, Bytes)>>,
  }

  impl RecordingTransport {
    pub fn sent_count(&self) -> usize {
      self.sent.lock().unwrap().len()
    }

    pub fn take_sent(&self) -> Vec<(Locator, Bytes)> {
      std::mem::take(&mut self.sent.lock().unwrap())
    }
  }

  impl Transport for RecordingTransport {
    fn bind_unicast(&self, _port: u16) -> std::io::Result<()> {
      Ok(())
    }
    fn join_multicast(&self, _locator: &Locator) -> std::io::Result<()> {
      Ok(())
    }
    fn send(&self, dest: &Locator, buffer: &[u8]) {
      self
        .sent
        .lock()
        .unwrap()
        .push((*dest, Bytes::copy_from_slice(buffer)));
    }
    fn start(&self, _sink: PacketSink) -> std::io::Result<()> {
      Ok(())
    }
    fn shutdown(&self) {}
  }

  fn topic() -> TopicData {
    TopicData::new("chatter", "String", ReliabilityKind::RELIABLE, TopicKind::NO_KEY)
  }

  fn writer_guid() -> Guid {
    Guid::new(GuidPrefix::new([2; 12]), EntityId::new_user_writer(1, false))
  }

  fn reader_guid() -> Guid {
    Guid::new(GuidPrefix::new([1; 12]), EntityId::new_user_reader(1, false))
  }

  fn data(sn: i64) -> Data {
    Data::new(
      reader_guid().entity_id,
      writer_guid().entity_id,
      SequenceNumber::from(sn),
      Some(Bytes::from_static(b"payload")),
    )
  }

  fn heartbeat(first: i64, last: i64, count: i32) -> Heartbeat {
    Heartbeat {
      reader_id: reader_guid().entity_id,
      writer_id: writer_guid().entity_id,
      first_sn: SequenceNumber::from(first),
      last_sn: SequenceNumber::from(last),
      count,
    }
  }

  fn matched_reader(transport: Arc<RecordingTransport>) -> (StatefulReader, Arc<AtomicUsize>) {
    let reader = StatefulReader::new(
      reader_guid(),
      topic(),
      transport,
      VendorId::THIS_IMPLEMENTATION,
    );
    reader.add_matched_writer(RtpsWriterProxy::new(
      writer_guid(),
      Locator::udpv4(std::net::Ipv4Addr::LOCALHOST, 7411),
    ));
    let deliveries = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&deliveries);
    reader.set_listener(Box::new(move |_info, _payload| {
      counter.fetch_add(1, Ordering::SeqCst);
    }));
    (reader, deliveries)
  }

  #[test]
  fn stateless_reader_delivers_matching_data() {
    let reader = StatelessReader::new(reader_guid(), topic(), None);
    reader.add_matched_writer(writer_guid());
    let deliveries = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&deliveries);
    reader.set_listener(Box::new(move |info, payload| {
      assert_eq!(info.sequence_number, SequenceNumber::from(1));
      assert_eq!(payload, b"payload");
      counter.fetch_add(1, Ordering::SeqCst);
    }));

    reader.handle_data(writer_guid().prefix, &data(1), None);
    assert_eq!(deliveries.load(Ordering::SeqCst), 1);

    // a second copy is delivered again: no duplicate tracking
    reader.handle_data(writer_guid().prefix, &data(1), None);
    assert_eq!(deliveries.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn stateless_reader_ignores_unrelated_broadcast() {
    let reader = StatelessReader::new(reader_guid(), topic(), None);
    let deliveries = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&deliveries);
    reader.set_listener(Box::new(move |_, _| {
      counter.fetch_add(1, Ordering::SeqCst);
    }));

    // broadcast reader id, writer not matched
    let broadcast = Data::new(
      EntityId::UNKNOWN,
      writer_guid().entity_id,
      SequenceNumber::from(1),
      None,
    );
    reader.handle_data(writer_guid().prefix, &broadcast, None);
    assert_eq!(deliveries.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn stateful_reader_drops_unknown_writer() {
    let transport = Arc::new(RecordingTransport::default());
    let (reader, deliveries) = matched_reader(transport);
    let foreign = GuidPrefix::new([8; 12]);
    reader.handle_data(foreign, &data(1), None);
    assert_eq!(deliveries.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn stateful_reader_suppresses_duplicates() {
    let transport = Arc::new(RecordingTransport::default());
    let (reader, deliveries) = matched_reader(transport);
    reader.handle_data(writer_guid().prefix, &data(1), None);
    reader.handle_data(writer_guid().prefix, &data(1), None);
    assert_eq!(deliveries.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn heartbeat_produces_acknack_requesting_missing() {
    let transport = Arc::new(RecordingTransport::default());
    let (reader, _) = matched_reader(transport.clone());
    reader.handle_data(writer_guid().prefix, &data(1), None);
    reader.handle_data(writer_guid().prefix, &data(2), None);
    reader.handle_data(writer_guid().prefix, &data(4), None);
    reader.handle_data(writer_guid().prefix, &data(5), None);

    reader.handle_heartbeat(writer_guid().prefix, &heartbeat(1, 5, 1), false);
    let sent = transport.take_sent();
    assert_eq!(sent.len(), 1);
    let message = Message::read_from_buffer(&sent[0].1).unwrap();
    let acknack = message
      .submessages
      .into_iter()
      .find_map(|sub| match sub.body {
        SubmessageBody::Entity(EntitySubmessage::AckNack(acknack, _)) => Some(acknack),
        _ => None,
      })
      .expect("no ACKNACK in response");
    assert_eq!(acknack.reader_sn_state.base(), SequenceNumber::from(3));
    assert_eq!(
      acknack.reader_sn_state.iter().collect::<Vec<_>>(),
      vec![SequenceNumber::from(3)]
    );
    assert_eq!(acknack.count, 1);
  }

  #[test]
  fn stale_heartbeat_count_produces_no_acknack() {
    let transport = Arc::new(RecordingTransport::default());
    let (reader, _) = matched_reader(transport.clone());
    reader.handle_heartbeat(writer_guid().prefix, &heartbeat(1, 1, 5), false);
    assert_eq!(transport.sent_count(), 1);

    // same count again: gated
    reader.handle_heartbeat(writer_guid().prefix, &heartbeat(1, 1, 5), false);
    assert_eq!(transport.sent_count(), 1);
    // lower count: gated
    reader.handle_heartbeat(writer_guid().prefix, &heartbeat(1, 1, 4), false);
    assert_eq!(transport.sent_count(), 1);
  }

  #[test]
  fn final_heartbeat_with_nothing_missing_is_not_acked() {
    let transport = Arc::new(RecordingTransport::default());
    let (reader, _) = matched_reader(transport.clone());
    reader.handle_data(writer_guid().prefix, &data(1), None);
    reader.handle_heartbeat(writer_guid().prefix, &heartbeat(1, 1, 1), true);
    assert_eq!(transport.sent_count(), 0);
  }

  #[test]
  fn unmatching_resets_the_writer_view() {
    let transport = Arc::new(RecordingTransport::default());
    let (reader, deliveries) = matched_reader(transport);
    reader.handle_data(writer_guid().prefix, &data(1), None);
    assert_eq!(deliveries.load(Ordering::SeqCst), 1);

    reader.remove_matched_writer(writer_guid());
    assert!(!reader.is_matched_to(writer_guid()));
    // back to Initial: data from the writer is dropped now
    reader.handle_data(writer_guid().prefix, &data(2), None);
    assert_eq!(deliveries.load(Ordering::SeqCst), 1);
  }
}
