//! The participant: owner of all local endpoints, the remote-participant
//! table, the discovery agents and the worker threads.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::Bytes;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use rand::Rng;

use crate::config::ParticipantConfig;
use crate::discovery::sedp::SedpAgent;
use crate::discovery::spdp::SpdpAgent;
use crate::discovery::spdp_participant_data::ParticipantProxyData;
use crate::error::ApiError;
use crate::network::constant::{builtin_unicast_port, spdp_multicast_port, user_unicast_port};
use crate::network::transport::{PacketInfo, Transport};
use crate::network::udp_transport::UdpTransport;
use crate::network::util::{local_multicast_locator, local_unicast_locators};
use crate::rtps::message_receiver::{LocalReader, LocalWriter, MessageReceiver};
use crate::rtps::reader::{SampleListener, StatefulReader, StatelessReader};
use crate::rtps::stateful_writer::StatefulWriter;
use crate::rtps::stateless_writer::StatelessWriter;
use crate::structure::builtin_endpoint::BuiltinEndpointSet;
use crate::structure::cache_change::ChangeKind;
use crate::structure::duration::Duration as RtpsDuration;
use crate::structure::guid::{EntityId, Guid, GuidPrefix};
use crate::structure::locator::Locator;
use crate::structure::sequence_number::SequenceNumber;
use crate::structure::topic_data::TopicData;
use crate::structure::{reliability_kind::ReliabilityKind, topic_kind::TopicKind};
use crate::thread_pool::{Dispatcher, ThreadPool};

// Service threads sleep in slices so stop() is prompt.
const SERVICE_SLEEP_SLICE: Duration = Duration::from_millis(50);

pub(crate) struct ParticipantInner {
  config: ParticipantConfig,
  guid_prefix: GuidPrefix,
  transport: Arc<dyn Transport>,
  thread_pool: ThreadPool,
  spdp: SpdpAgent,
  sedp: SedpAgent,

  readers: Mutex<BTreeMap<EntityId, LocalReader>>,
  writers: Mutex<BTreeMap<EntityId, LocalWriter>>,
  remote_participants: Mutex<Vec<ParticipantProxyData>>,
  user_entity_counter: AtomicU32,
  running: AtomicBool,
  service_threads: Mutex<Vec<JoinHandle<()>>>,
}

impl ParticipantInner {
  pub fn guid_prefix(&self) -> GuidPrefix {
    self.guid_prefix
  }

  pub fn spdp(&self) -> &SpdpAgent {
    &self.spdp
  }

  pub fn sedp(&self) -> &SedpAgent {
    &self.sedp
  }

  pub fn is_running(&self) -> bool {
    self.running.load(Ordering::SeqCst)
  }

  /// Refuses duplicates by GuidPrefix.
  pub fn add_remote_participant(&self, data: ParticipantProxyData) -> bool {
    let mut table = self
      .remote_participants
      .lock()
      .unwrap_or_else(|e| e.into_inner());
    if table.iter().any(|p| p.guid_prefix == data.guid_prefix) {
      return false;
    }
    table.push(data);
    true
  }

  pub fn find_remote_participant(&self, guid_prefix: GuidPrefix) -> bool {
    self
      .remote_participants
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .iter()
      .any(|p| p.guid_prefix == guid_prefix)
  }

  /// Explicit disposal is the only way an entry leaves the table;
  /// lease expiry is not enforced.
  pub fn remove_remote_participant(&self, guid_prefix: GuidPrefix) {
    self
      .remote_participants
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .retain(|p| p.guid_prefix != guid_prefix);
  }

  /// User-traffic locator of a discovered participant.
  pub fn remote_default_locator(&self, guid_prefix: GuidPrefix) -> Option<Locator> {
    self
      .remote_participants
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .iter()
      .find(|p| p.guid_prefix == guid_prefix)
      .and_then(|p| p.default_locator())
  }

  pub fn user_readers(&self) -> Vec<LocalReader> {
    self
      .readers
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .iter()
      .filter(|(id, _)| !id.entity_kind.is_builtin())
      .map(|(_, r)| r.clone())
      .collect()
  }

  pub fn user_writers(&self) -> Vec<LocalWriter> {
    self
      .writers
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .iter()
      .filter(|(id, _)| !id.entity_kind.is_builtin())
      .map(|(_, w)| w.clone())
      .collect()
  }

  fn local_participant_data(&self) -> ParticipantProxyData {
    let domain_id = self.config.domain_id;
    let participant_id = self.config.participant_id;
    ParticipantProxyData {
      protocol_version: crate::messages::protocol_version::ProtocolVersion::THIS_IMPLEMENTATION,
      vendor_id: self.config.vendor_id,
      guid_prefix: self.guid_prefix,
      metatraffic_unicast_locators: local_unicast_locators(builtin_unicast_port(
        domain_id,
        participant_id,
      )),
      metatraffic_multicast_locators: vec![local_multicast_locator(spdp_multicast_port(domain_id))],
      default_unicast_locators: local_unicast_locators(user_unicast_port(
        domain_id,
        participant_id,
      )),
      builtin_endpoints: BuiltinEndpointSet::ALL_SUPPORTED,
      lease_duration: RtpsDuration::from_std(self.config.lease_duration),
    }
  }

  fn stateful_writer_ids(&self) -> Vec<EntityId> {
    self
      .writers
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .iter()
      .filter_map(|(id, w)| match w {
        LocalWriter::Stateful(_) => Some(*id),
        LocalWriter::Stateless(_) => None,
      })
      .collect()
  }
}

impl Dispatcher for ParticipantInner {
  fn handle_packet(&self, packet: PacketInfo) {
    trace!(
      "packet of {} bytes on port {} from {}",
      packet.buffer.len(),
      packet.dest_port,
      packet.source
    );
    // Snapshot the registries so no registry lock is held while the
    // endpoints run (their own mutexes guard their state).
    let readers: Vec<LocalReader> = self
      .readers
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .values()
      .cloned()
      .collect();
    let writers: Vec<LocalWriter> = self
      .writers
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .values()
      .cloned()
      .collect();
    MessageReceiver::new(self.guid_prefix, &readers, &writers).handle_packet(&packet.buffer);
  }

  fn progress_writer(&self, writer_id: EntityId) {
    let writer = self
      .writers
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .get(&writer_id)
      .cloned();
    match writer {
      Some(writer) => writer.progress(),
      None => trace!("work item for removed writer {writer_id:?}"),
    }
  }
}

/// An RTPS participant on one domain. Create endpoints with
/// [`create_writer`](Self::create_writer) and
/// [`create_reader`](Self::create_reader), then [`start`](Self::start)
/// to bind the network and begin discovery. Endpoints live until the
/// participant is dropped.
pub struct DomainParticipant {
  inner: Arc<ParticipantInner>,
}

impl DomainParticipant {
  /// A participant on the host UDP stack.
  pub fn new(config: ParticipantConfig) -> Result<DomainParticipant, ApiError> {
    let transport = Arc::new(UdpTransport::new()?);
    Ok(Self::with_transport(config, transport))
  }

  /// A participant on a caller-provided transport. This is the seam
  /// for in-memory transports in tests and for custom network stacks.
  pub fn with_transport(
    config: ParticipantConfig,
    transport: Arc<dyn Transport>,
  ) -> DomainParticipant {
    let guid_prefix = new_guid_prefix(config.participant_id, &config);
    let thread_pool = ThreadPool::new(config.incoming_queue_depth, config.outgoing_queue_depth);
    let spdp = SpdpAgent::new(
      guid_prefix,
      &config,
      Arc::clone(&transport),
      thread_pool.work_queue(),
    );
    let sedp = SedpAgent::new(
      guid_prefix,
      &config,
      Arc::clone(&transport),
      thread_pool.work_queue(),
    );

    let inner = Arc::new(ParticipantInner {
      config,
      guid_prefix,
      transport,
      thread_pool,
      spdp,
      sedp,
      readers: Mutex::new(BTreeMap::new()),
      writers: Mutex::new(BTreeMap::new()),
      remote_participants: Mutex::new(Vec::new()),
      user_entity_counter: AtomicU32::new(1),
      running: AtomicBool::new(false),
      service_threads: Mutex::new(Vec::new()),
    });

    // Builtin endpoints join the registries like any other endpoint so
    // that routing and progress work uniformly.
    {
      let mut readers = inner.readers.lock().unwrap_or_else(|e| e.into_inner());
      readers.insert(
        inner.spdp.reader.guid().entity_id,
        LocalReader::Stateless(Arc::clone(&inner.spdp.reader)),
      );
      readers.insert(
        inner.sedp.publications_reader.guid().entity_id,
        LocalReader::Stateful(Arc::clone(&inner.sedp.publications_reader)),
      );
      readers.insert(
        inner.sedp.subscriptions_reader.guid().entity_id,
        LocalReader::Stateful(Arc::clone(&inner.sedp.subscriptions_reader)),
      );
      let mut writers = inner.writers.lock().unwrap_or_else(|e| e.into_inner());
      writers.insert(
        inner.spdp.writer.guid().entity_id,
        LocalWriter::Stateless(Arc::clone(&inner.spdp.writer)),
      );
      writers.insert(
        inner.sedp.publications_writer.guid().entity_id,
        LocalWriter::Stateful(Arc::clone(&inner.sedp.publications_writer)),
      );
      writers.insert(
        inner.sedp.subscriptions_writer.guid().entity_id,
        LocalWriter::Stateful(Arc::clone(&inner.sedp.subscriptions_writer)),
      );
    }
    inner.spdp.attach(&inner);
    inner.sedp.attach(&inner);

    DomainParticipant { inner }
  }

  pub fn guid_prefix(&self) -> GuidPrefix {
    self.inner.guid_prefix
  }

  /// Number of peers currently in the remote-participant table.
  pub fn remote_participant_count(&self) -> usize {
    self
      .inner
      .remote_participants
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .len()
  }

  /// Creates a user writer. RELIABLE writers run the stateful
  /// heartbeat/ACKNACK protocol; BEST_EFFORT writers are stateless.
  pub fn create_writer(
    &self,
    topic_name: &str,
    type_name: &str,
    reliability: ReliabilityKind,
    topic_kind: TopicKind,
  ) -> Result<Writer, ApiError> {
    let inner = &self.inner;
    let topic = TopicData::new(topic_name, type_name, reliability, topic_kind);
    let key = inner.user_entity_counter.fetch_add(1, Ordering::SeqCst);
    let entity_id = EntityId::new_user_writer(key, topic_kind.has_key());
    let guid = Guid::new(inner.guid_prefix, entity_id);

    let endpoint = if reliability.is_reliable() {
      LocalWriter::Stateful(Arc::new(StatefulWriter::new(
        guid,
        topic.clone(),
        inner.config.history_depth_user,
        inner.config.heartbeat_period,
        Arc::clone(&inner.transport),
        inner.thread_pool.work_queue(),
        inner.config.vendor_id,
      )))
    } else {
      LocalWriter::Stateless(Arc::new(StatelessWriter::new(
        guid,
        topic.clone(),
        inner.config.history_depth_user,
        Arc::clone(&inner.transport),
        inner.thread_pool.work_queue(),
        inner.config.vendor_id,
      )))
    };
    inner
      .writers
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .insert(entity_id, endpoint.clone());
    inner.sedp.announce_local_writer(guid, &topic);
    info!("created writer {guid:?} on topic {topic_name}");

    Ok(Writer {
      endpoint,
      participant: Arc::downgrade(inner),
    })
  }

  /// Creates a user reader. The sample callback is registered on the
  /// returned handle.
  pub fn create_reader(
    &self,
    topic_name: &str,
    type_name: &str,
    reliability: ReliabilityKind,
    topic_kind: TopicKind,
  ) -> Result<Reader, ApiError> {
    let inner = &self.inner;
    let topic = TopicData::new(topic_name, type_name, reliability, topic_kind);
    let key = inner.user_entity_counter.fetch_add(1, Ordering::SeqCst);
    let entity_id = EntityId::new_user_reader(key, topic_kind.has_key());
    let guid = Guid::new(inner.guid_prefix, entity_id);

    let endpoint = if reliability.is_reliable() {
      LocalReader::Stateful(Arc::new(StatefulReader::new(
        guid,
        topic.clone(),
        Arc::clone(&inner.transport),
        inner.config.vendor_id,
      )))
    } else {
      LocalReader::Stateless(Arc::new(StatelessReader::new(guid, topic.clone(), None)))
    };
    inner
      .readers
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .insert(entity_id, endpoint.clone());
    inner.sedp.announce_local_reader(guid, &topic);
    info!("created reader {guid:?} on topic {topic_name}");

    Ok(Reader {
      endpoint,
      participant: Arc::downgrade(inner),
    })
  }

  /// Binds the RTPS ports, starts the worker threads and begins
  /// SPDP announcements.
  pub fn start(&self) -> Result<(), ApiError> {
    let inner = &self.inner;
    if inner.running.swap(true, Ordering::SeqCst) {
      return Ok(());
    }
    let domain_id = inner.config.domain_id;
    let participant_id = inner.config.participant_id;

    inner
      .transport
      .bind_unicast(builtin_unicast_port(domain_id, participant_id))?;
    inner
      .transport
      .bind_unicast(user_unicast_port(domain_id, participant_id))?;
    inner
      .transport
      .join_multicast(&local_multicast_locator(spdp_multicast_port(domain_id)))?;

    inner.thread_pool.start(
      Arc::clone(inner) as Arc<dyn Dispatcher>,
      inner.config.reader_threads,
      inner.config.writer_threads,
    );
    inner.transport.start(inner.thread_pool.packet_sink())?;

    inner.spdp.announce_self(&inner.local_participant_data());

    let mut service_threads = inner
      .service_threads
      .lock()
      .unwrap_or_else(|e| e.into_inner());

    // SPDP resend tick
    {
      let weak = Arc::downgrade(inner);
      let period = inner.config.spdp_resend_period;
      service_threads.push(
        thread::Builder::new()
          .name("rtps-spdp".to_string())
          .spawn(move || service_loop(weak, period, |inner| {
            inner.spdp.writer.unsent_changes_reset();
          }))
          .expect("spawning SPDP thread"),
      );
    }
    // Heartbeat tick: re-enqueue every stateful writer so progress()
    // can emit the periodic heartbeats.
    {
      let weak = Arc::downgrade(inner);
      let period = inner.config.heartbeat_period;
      service_threads.push(
        thread::Builder::new()
          .name("rtps-heartbeat".to_string())
          .spawn(move || service_loop(weak, period, |inner| {
            let work_queue = inner.thread_pool.work_queue();
            for entity_id in inner.stateful_writer_ids() {
              work_queue.enqueue(entity_id);
            }
          }))
          .expect("spawning heartbeat thread"),
      );
    }

    info!(
      "participant {:?} started on domain {domain_id} (participant id {participant_id})",
      inner.guid_prefix
    );
    Ok(())
  }

  /// Stops worker and service threads and closes the transport.
  /// Endpoint handles remain valid but operations on them fail with
  /// [`ApiError::NotInitialized`].
  pub fn stop(&self) {
    let inner = &self.inner;
    if !inner.running.swap(false, Ordering::SeqCst) {
      return;
    }
    inner.transport.shutdown();
    inner.thread_pool.stop();
    let service_threads = std::mem::take(
      &mut *inner
        .service_threads
        .lock()
        .unwrap_or_else(|e| e.into_inner()),
    );
    for handle in service_threads {
      if handle.join().is_err() {
        error!("service thread panicked");
      }
    }
    info!("participant {:?} stopped", inner.guid_prefix);
  }
}

impl Drop for DomainParticipant {
  fn drop(&mut self) {
    self.stop();
  }
}

fn service_loop(
  weak: Weak<ParticipantInner>,
  period: Duration,
  tick: impl Fn(&ParticipantInner) + Send + 'static,
) {
  let mut elapsed = Duration::ZERO;
  loop {
    thread::sleep(SERVICE_SLEEP_SLICE);
    let Some(inner) = weak.upgrade() else { return };
    if !inner.is_running() {
      return;
    }
    elapsed += SERVICE_SLEEP_SLICE;
    if elapsed >= period {
      elapsed = Duration::ZERO;
      tick(&inner);
    }
  }
}

/// The GuidPrefix of a new participant: vendor bytes first, the rest
/// random entropy plus the participant id, so prefixes stay unique
/// across hosts and restarts.
fn new_guid_prefix(participant_id: u16, config: &ParticipantConfig) -> GuidPrefix {
  let mut bytes = [0u8; 12];
  bytes[0..2].copy_from_slice(&config.vendor_id.vendor_id);
  rand::thread_rng().fill(&mut bytes[2..10]);
  bytes[10..12].copy_from_slice(&participant_id.to_be_bytes());
  GuidPrefix::new(bytes)
}

/// Handle to a user writer.
pub struct Writer {
  endpoint: LocalWriter,
  participant: Weak<ParticipantInner>,
}

impl Writer {
  pub fn guid(&self) -> Guid {
    match &self.endpoint {
      LocalWriter::Stateless(w) => w.guid(),
      LocalWriter::Stateful(w) => w.guid(),
    }
  }

  /// Publishes one change. Fails with
  /// [`ApiError::NotInitialized`] before `participant.start()`, and
  /// with a rejected-kind error for lifecycle kinds on NO_KEY topics.
  pub fn new_change(&self, kind: ChangeKind, payload: Bytes) -> Result<SequenceNumber, ApiError> {
    let participant = self.participant.upgrade().ok_or(ApiError::NotInitialized)?;
    if !participant.is_running() {
      return Err(ApiError::NotInitialized);
    }
    let sn = match &self.endpoint {
      LocalWriter::Stateless(w) => w.new_change(kind, payload)?,
      LocalWriter::Stateful(w) => w.new_change(kind, payload)?,
    };
    Ok(sn)
  }
}

/// Handle to a user reader.
pub struct Reader {
  endpoint: LocalReader,
  participant: Weak<ParticipantInner>,
}

impl Reader {
  pub fn guid(&self) -> Guid {
    match &self.endpoint {
      LocalReader::Stateless(r) => r.guid(),
      LocalReader::Stateful(r) => r.guid(),
    }
  }

  /// Registers the sample callback.
  ///
  /// # Contract
  ///
  /// The callback runs with the reader's mutex held, on a dispatcher
  /// thread: it must not block and must not call back into this
  /// reader.
  pub fn set_listener(&self, listener: SampleListener) {
    match &self.endpoint {
      LocalReader::Stateless(r) => r.set_listener(listener),
      LocalReader::Stateful(r) => r.set_listener(listener),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::rtps::reader::tests::RecordingTransport;

  fn participant() -> DomainParticipant {
    DomainParticipant::with_transport(
      ParticipantConfig::default(),
      Arc::new(RecordingTransport::default()),
    )
  }

  #[test]
  fn guid_prefix_embeds_vendor_and_participant_id() {
    let config = ParticipantConfig::default();
    let prefix = new_guid_prefix(3, &config);
    assert_eq!(&prefix.bytes[0..2], &config.vendor_id.vendor_id);
    assert_eq!(&prefix.bytes[10..12], &[0x00, 0x03]);
  }

  #[test]
  fn user_entity_ids_are_unique() {
    let participant = participant();
    let w1 = participant
      .create_writer("a", "A", ReliabilityKind::RELIABLE, TopicKind::NO_KEY)
      .unwrap();
    let w2 = participant
      .create_writer("b", "B", ReliabilityKind::BEST_EFFORT, TopicKind::NO_KEY)
      .unwrap();
    let r1 = participant
      .create_reader("a", "A", ReliabilityKind::RELIABLE, TopicKind::NO_KEY)
      .unwrap();
    assert_ne!(w1.guid(), w2.guid());
    assert_ne!(w1.guid().entity_id, r1.guid().entity_id);
  }

  #[test]
  fn remote_participant_table_refuses_duplicates() {
    let participant = participant();
    let data = ParticipantProxyData {
      protocol_version: crate::messages::protocol_version::ProtocolVersion::THIS_IMPLEMENTATION,
      vendor_id: crate::messages::vendor_id::VendorId::THIS_IMPLEMENTATION,
      guid_prefix: GuidPrefix::new([7; 12]),
      metatraffic_unicast_locators: vec![],
      metatraffic_multicast_locators: vec![],
      default_unicast_locators: vec![],
      builtin_endpoints: BuiltinEndpointSet::ALL_SUPPORTED,
      lease_duration: RtpsDuration::ZERO,
    };
    assert!(participant.inner.add_remote_participant(data.clone()));
    assert!(!participant.inner.add_remote_participant(data));
    assert!(participant.inner.find_remote_participant(GuidPrefix::new([7; 12])));

    participant
      .inner
      .remove_remote_participant(GuidPrefix::new([7; 12]));
    assert!(!participant.inner.find_remote_participant(GuidPrefix::new([7; 12])));
  }

  #[test]
  fn writes_before_start_are_rejected() {
    let participant = participant();
    let writer = participant
      .create_writer("t", "T", ReliabilityKind::BEST_EFFORT, TopicKind::NO_KEY)
      .unwrap();
    assert!(matches!(
      writer.new_change(ChangeKind::ALIVE, Bytes::new()),
      Err(ApiError::NotInitialized)
    ));
  }

  #[test]
  fn start_and_stop_round_trip() {
    let participant = participant();
    participant.start().unwrap();
    let writer = participant
      .create_writer("t", "T", ReliabilityKind::BEST_EFFORT, TopicKind::NO_KEY)
      .unwrap();
    assert!(writer.new_change(ChangeKind::ALIVE, Bytes::from_static(b"x")).is_ok());
    participant.stop();
    assert!(matches!(
      writer.new_change(ChangeKind::ALIVE, Bytes::new()),
      Err(ApiError::NotInitialized)
    ));
  }
}
