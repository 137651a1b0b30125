use std::sync::Arc;

#[allow(unused_imports)]
use log::{debug, info, trace, warn};
use speedy::{Endianness, Readable};

use crate::config::ParticipantConfig;
use crate::discovery::sedp_endpoint_data::DiscoveredEndpointData;
use crate::network::transport::Transport;
use crate::participant::ParticipantInner;
use crate::rtps::message_receiver::{LocalReader, LocalWriter};
use crate::rtps::reader::{SampleInfo, StatefulReader};
use crate::rtps::reader_proxy::RtpsReaderProxy;
use crate::rtps::stateful_writer::StatefulWriter;
use crate::rtps::writer_proxy::RtpsWriterProxy;
use crate::structure::cache_change::ChangeKind;
use crate::structure::guid::{EntityId, Guid, GuidPrefix};
use crate::structure::reliability_kind::ReliabilityKind;
use crate::structure::topic_data::TopicData;
use crate::structure::topic_kind::TopicKind;
use crate::thread_pool::WorkQueue;

/// Simple Endpoint Discovery: four reliable builtin endpoints
/// exchanging publication and subscription announcements. On a match
/// (equal topic and type name) the corresponding proxies are wired
/// onto the local user endpoints.
pub(crate) struct SedpAgent {
  pub publications_writer: Arc<StatefulWriter>,
  pub publications_reader: Arc<StatefulReader>,
  pub subscriptions_writer: Arc<StatefulWriter>,
  pub subscriptions_reader: Arc<StatefulReader>,
}

impl SedpAgent {
  pub fn new(
    guid_prefix: GuidPrefix,
    config: &ParticipantConfig,
    transport: Arc<dyn Transport>,
    work_queue: WorkQueue,
  ) -> SedpAgent {
    let publication_topic = TopicData::new(
      "DCPSPublication",
      "PublicationBuiltinTopicData",
      ReliabilityKind::RELIABLE,
      TopicKind::WITH_KEY,
    );
    let subscription_topic = TopicData::new(
      "DCPSSubscription",
      "SubscriptionBuiltinTopicData",
      ReliabilityKind::RELIABLE,
      TopicKind::WITH_KEY,
    );

    let new_writer = |entity_id, topic: &TopicData| {
      Arc::new(StatefulWriter::new(
        Guid::new(guid_prefix, entity_id),
        topic.clone(),
        config.history_depth_builtin,
        config.heartbeat_period,
        Arc::clone(&transport),
        work_queue.clone(),
        config.vendor_id,
      ))
    };
    let new_reader = |entity_id, topic: &TopicData| {
      Arc::new(StatefulReader::new(
        Guid::new(guid_prefix, entity_id),
        topic.clone(),
        Arc::clone(&transport),
        config.vendor_id,
      ))
    };

    SedpAgent {
      publications_writer: new_writer(
        EntityId::SEDP_BUILTIN_PUBLICATIONS_WRITER,
        &publication_topic,
      ),
      publications_reader: new_reader(
        EntityId::SEDP_BUILTIN_PUBLICATIONS_READER,
        &publication_topic,
      ),
      subscriptions_writer: new_writer(
        EntityId::SEDP_BUILTIN_SUBSCRIPTIONS_WRITER,
        &subscription_topic,
      ),
      subscriptions_reader: new_reader(
        EntityId::SEDP_BUILTIN_SUBSCRIPTIONS_READER,
        &subscription_topic,
      ),
    }
  }

  /// Publishes a local user writer to every matched peer.
  pub fn announce_local_writer(&self, guid: Guid, topic: &TopicData) {
    let data = DiscoveredEndpointData::new(guid, &topic.topic_name, &topic.type_name, topic.reliability);
    if let Err(e) = self
      .publications_writer
      .new_change(ChangeKind::ALIVE, data.to_pl_cdr_bytes())
    {
      warn!("cannot store publication announcement: {e}");
    }
  }

  /// Publishes a local user reader to every matched peer.
  pub fn announce_local_reader(&self, guid: Guid, topic: &TopicData) {
    let data = DiscoveredEndpointData::new(guid, &topic.topic_name, &topic.type_name, topic.reliability);
    if let Err(e) = self
      .subscriptions_writer
      .new_change(ChangeKind::ALIVE, data.to_pl_cdr_bytes())
    {
      warn!("cannot store subscription announcement: {e}");
    }
  }

  /// Wires inbound announcement handling into the participant.
  pub fn attach(&self, inner: &Arc<ParticipantInner>) {
    let weak = Arc::downgrade(inner);
    self
      .publications_reader
      .set_listener(Box::new(move |info, payload| {
        if let Some(inner) = weak.upgrade() {
          handle_publication_sample(&inner, info, payload);
        }
      }));
    let weak = Arc::downgrade(inner);
    self
      .subscriptions_reader
      .set_listener(Box::new(move |info, payload| {
        if let Some(inner) = weak.upgrade() {
          handle_subscription_sample(&inner, info, payload);
        }
      }));
  }
}

fn disposed_guid(info: &SampleInfo) -> Option<Guid> {
  let key = info.key_hash?;
  Guid::read_from_buffer_with_ctx(Endianness::BigEndian, &key).ok()
}

/// A remote writer appeared (or went away): match it against local
/// user readers by topic and type name.
fn handle_publication_sample(inner: &Arc<ParticipantInner>, info: &SampleInfo, payload: &[u8]) {
  if payload.is_empty() {
    if let Some(guid) = disposed_guid(info) {
      info!("publication {guid:?} disposed");
      for reader in inner.user_readers() {
        match reader {
          LocalReader::Stateful(r) => r.remove_matched_writer(guid),
          LocalReader::Stateless(r) => r.remove_matched_writer(guid),
        }
      }
    }
    return;
  }

  let data = match DiscoveredEndpointData::from_pl_cdr_bytes(payload) {
    Ok(data) => data,
    Err(e) => {
      debug!("undecodable publication announcement: {e}");
      return;
    }
  };
  if data.endpoint_guid.prefix == inner.guid_prefix() {
    return;
  }
  // Only endpoints of SPDP-discovered participants may be matched.
  let Some(locator) = inner.remote_default_locator(data.endpoint_guid.prefix) else {
    debug!(
      "publication from undiscovered participant {:?}, dropped",
      data.endpoint_guid.prefix
    );
    return;
  };

  for reader in inner.user_readers() {
    match reader {
      LocalReader::Stateful(r) => {
        if r.topic().matches_names(&data.topic_name, &data.type_name)
          && !r.is_matched_to(data.endpoint_guid)
        {
          info!(
            "matched remote writer {:?} to reader {:?} on topic {}",
            data.endpoint_guid,
            r.guid(),
            data.topic_name
          );
          r.add_matched_writer(RtpsWriterProxy::new(data.endpoint_guid, locator));
        }
      }
      LocalReader::Stateless(r) => {
        if r.topic().matches_names(&data.topic_name, &data.type_name) {
          r.add_matched_writer(data.endpoint_guid);
        }
      }
    }
  }
}

/// A remote reader appeared (or went away): match it against local
/// user writers by topic and type name.
fn handle_subscription_sample(inner: &Arc<ParticipantInner>, info: &SampleInfo, payload: &[u8]) {
  if payload.is_empty() {
    if let Some(guid) = disposed_guid(info) {
      info!("subscription {guid:?} disposed");
      for writer in inner.user_writers() {
        match writer {
          LocalWriter::Stateful(w) => w.remove_matched_reader(guid),
          LocalWriter::Stateless(_) => {
            // Stateless writers track only locators; the locator may
            // serve other readers, so it stays.
          }
        }
      }
    }
    return;
  }

  let data = match DiscoveredEndpointData::from_pl_cdr_bytes(payload) {
    Ok(data) => data,
    Err(e) => {
      debug!("undecodable subscription announcement: {e}");
      return;
    }
  };
  if data.endpoint_guid.prefix == inner.guid_prefix() {
    return;
  }
  let Some(locator) = inner.remote_default_locator(data.endpoint_guid.prefix) else {
    debug!(
      "subscription from undiscovered participant {:?}, dropped",
      data.endpoint_guid.prefix
    );
    return;
  };

  for writer in inner.user_writers() {
    match writer {
      LocalWriter::Stateful(w) => {
        if w.topic().matches_names(&data.topic_name, &data.type_name)
          && !w.is_matched_to(data.endpoint_guid)
        {
          info!(
            "matched remote reader {:?} to writer {:?} on topic {}",
            data.endpoint_guid,
            w.guid(),
            data.topic_name
          );
          w.add_matched_reader(RtpsReaderProxy::new(
            data.endpoint_guid,
            locator,
            data.reliability.is_reliable(),
            false,
          ));
        }
      }
      LocalWriter::Stateless(w) => {
        if w.topic().matches_names(&data.topic_name, &data.type_name) {
          w.add_reader_locator(locator);
        }
      }
    }
  }
}
