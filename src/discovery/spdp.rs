use std::sync::Arc;

#[allow(unused_imports)]
use log::{debug, info, trace, warn};

use crate::config::ParticipantConfig;
use crate::discovery::spdp_participant_data::ParticipantProxyData;
use crate::network::constant::spdp_multicast_port;
use crate::network::transport::Transport;
use crate::network::util::local_multicast_locator;
use crate::participant::ParticipantInner;
use crate::rtps::reader::StatelessReader;
use crate::rtps::reader_proxy::RtpsReaderProxy;
use crate::rtps::stateless_writer::StatelessWriter;
use crate::rtps::writer_proxy::RtpsWriterProxy;
use crate::structure::builtin_endpoint::BuiltinEndpointSet;
use crate::structure::cache_change::ChangeKind;
use crate::structure::guid::{EntityId, Guid, GuidPrefix};
use crate::structure::reliability_kind::ReliabilityKind;
use crate::structure::topic_data::TopicData;
use crate::structure::topic_kind::TopicKind;
use crate::thread_pool::WorkQueue;

/// Simple Participant Discovery: a stateless writer multicasting the
/// local [`ParticipantProxyData`] on a fixed period, and a stateless
/// reader detecting peers from their announcements.
pub(crate) struct SpdpAgent {
  pub writer: Arc<StatelessWriter>,
  pub reader: Arc<StatelessReader>,
}

impl SpdpAgent {
  pub fn new(
    guid_prefix: GuidPrefix,
    config: &ParticipantConfig,
    transport: Arc<dyn Transport>,
    work_queue: WorkQueue,
  ) -> SpdpAgent {
    let topic = TopicData::new(
      "DCPSParticipant",
      "SPDPDiscoveredParticipantData",
      ReliabilityKind::BEST_EFFORT,
      TopicKind::WITH_KEY,
    );
    let writer = Arc::new(StatelessWriter::new(
      Guid::new(guid_prefix, EntityId::SPDP_BUILTIN_PARTICIPANT_WRITER),
      topic.clone(),
      config.history_depth_builtin,
      transport,
      work_queue,
      config.vendor_id,
    ));
    writer.add_reader_locator(local_multicast_locator(spdp_multicast_port(config.domain_id)));

    let reader = Arc::new(StatelessReader::new(
      Guid::new(guid_prefix, EntityId::SPDP_BUILTIN_PARTICIPANT_READER),
      topic,
      // Announcements come from participants nobody has discovered
      // yet, so acceptance is by the well-known writer entity id.
      Some(EntityId::SPDP_BUILTIN_PARTICIPANT_WRITER),
    ));

    SpdpAgent { writer, reader }
  }

  /// Puts the local announcement into the SPDP writer history. The
  /// periodic resend keeps re-marking it unsent.
  pub fn announce_self(&self, data: &ParticipantProxyData) {
    if let Err(e) = self.writer.new_change(ChangeKind::ALIVE, data.to_pl_cdr_bytes()) {
      warn!("cannot store SPDP announcement: {e}");
    }
  }

  /// Wires the inbound announcement handling into the participant.
  pub fn attach(&self, inner: &Arc<ParticipantInner>) {
    let weak = Arc::downgrade(inner);
    self.reader.set_listener(Box::new(move |_info, payload| {
      if let Some(inner) = weak.upgrade() {
        handle_spdp_payload(&inner, payload);
      }
    }));
  }
}

fn handle_spdp_payload(inner: &Arc<ParticipantInner>, payload: &[u8]) {
  let data = match ParticipantProxyData::from_pl_cdr_bytes(payload) {
    Ok(data) => data,
    Err(e) => {
      debug!("undecodable SPDP announcement: {e}");
      return;
    }
  };

  if data.guid_prefix == inner.guid_prefix() {
    trace!("own SPDP echo, ignored");
    return;
  }
  if inner.find_remote_participant(data.guid_prefix) {
    // Already in our table; re-announce anyway to help the peer.
    inner.spdp().writer.unsent_changes_reset();
    return;
  }

  info!("discovered participant {:?}", data.guid_prefix);
  if inner.add_remote_participant(data.clone()) {
    wire_builtin_endpoints(inner, &data);
    // Re-announce immediately so the newcomer learns us without
    // waiting a full resend period.
    inner.spdp().writer.unsent_changes_reset();
  }
}

/// Matches our SEDP endpoints against the peer's advertised builtin
/// endpoint set, all at the peer's metatraffic locator.
fn wire_builtin_endpoints(inner: &Arc<ParticipantInner>, data: &ParticipantProxyData) {
  let Some(locator) = data.metatraffic_locator() else {
    warn!(
      "participant {:?} announced no usable metatraffic locator",
      data.guid_prefix
    );
    return;
  };
  let sedp = inner.sedp();
  let prefix = data.guid_prefix;
  let endpoints = data.builtin_endpoints;

  if endpoints.contains(BuiltinEndpointSet::PUBLICATIONS_ANNOUNCER) {
    sedp.publications_reader.add_matched_writer(RtpsWriterProxy::new(
      Guid::new(prefix, EntityId::SEDP_BUILTIN_PUBLICATIONS_WRITER),
      locator,
    ));
  }
  if endpoints.contains(BuiltinEndpointSet::PUBLICATIONS_DETECTOR) {
    sedp.publications_writer.add_matched_reader(RtpsReaderProxy::new(
      Guid::new(prefix, EntityId::SEDP_BUILTIN_PUBLICATIONS_READER),
      locator,
      true,
      false,
    ));
  }
  if endpoints.contains(BuiltinEndpointSet::SUBSCRIPTIONS_ANNOUNCER) {
    sedp.subscriptions_reader.add_matched_writer(RtpsWriterProxy::new(
      Guid::new(prefix, EntityId::SEDP_BUILTIN_SUBSCRIPTIONS_WRITER),
      locator,
    ));
  }
  if endpoints.contains(BuiltinEndpointSet::SUBSCRIPTIONS_DETECTOR) {
    sedp.subscriptions_writer.add_matched_reader(RtpsReaderProxy::new(
      Guid::new(prefix, EntityId::SEDP_BUILTIN_SUBSCRIPTIONS_READER),
      locator,
      true,
      false,
    ));
  }
}
