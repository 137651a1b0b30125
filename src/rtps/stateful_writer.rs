use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
#[allow(unused_imports)]
use log::{debug, trace, warn};

use crate::error::HistoryError;
use crate::messages::ack_nack::AckNack;
use crate::messages::message::MessageBuilder;
use crate::messages::vendor_id::VendorId;
use crate::network::transport::Transport;
use crate::rtps::reader_proxy::RtpsReaderProxy;
use crate::structure::cache_change::{CacheChange, ChangeKind};
use crate::structure::guid::{Guid, GuidPrefix};
use crate::structure::history_cache::HistoryCache;
use crate::structure::locator::Locator;
use crate::structure::sequence_number::SequenceNumber;
use crate::structure::time::Timestamp;
use crate::structure::topic_data::TopicData;
use crate::thread_pool::WorkQueue;

/// Reliable writer. Tracks per-reader acknowledgment state, repairs
/// losses on ACKNACK requests, and spaces HEARTBEATs at the configured
/// period. Progress sends at most one DATA per reader per call and
/// re-enqueues itself while work remains, so one slow reader cannot
/// monopolize a writer thread.
pub struct StatefulWriter {
  guid: Guid,
  topic: TopicData,
  vendor_id: VendorId,
  heartbeat_period: Duration,
  transport: Arc<dyn Transport>,
  work_queue: WorkQueue,
  inner: Mutex<Inner>,
}

struct Inner {
  history: HistoryCache,
  last_change_sn: SequenceNumber,
  reader_proxies: Vec<RtpsReaderProxy>,
}

impl StatefulWriter {
  pub fn new(
    guid: Guid,
    topic: TopicData,
    history_depth: usize,
    heartbeat_period: Duration,
    transport: Arc<dyn Transport>,
    work_queue: WorkQueue,
    vendor_id: VendorId,
  ) -> StatefulWriter {
    StatefulWriter {
      guid,
      topic,
      vendor_id,
      heartbeat_period,
      transport,
      work_queue,
      inner: Mutex::new(Inner {
        history: HistoryCache::with_capacity(history_depth),
        last_change_sn: SequenceNumber::zero(),
        reader_proxies: Vec::new(),
      }),
    }
  }

  pub fn guid(&self) -> Guid {
    self.guid
  }

  pub fn topic(&self) -> &TopicData {
    &self.topic
  }

  /// Appends a change, notifies every matched reader proxy, schedules
  /// transmission. Returns the assigned sequence number.
  pub fn new_change(&self, kind: ChangeKind, data: Bytes) -> Result<SequenceNumber, HistoryError> {
    if !self.topic.topic_kind.has_key() && kind != ChangeKind::ALIVE {
      return Err(HistoryError::RejectedKind);
    }
    let sn = {
      let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
      inner.last_change_sn = inner.last_change_sn.next();
      let sn = inner.last_change_sn;
      inner.history.add_change(CacheChange::new(kind, self.guid, sn, data));
      for proxy in &mut inner.reader_proxies {
        proxy.notify_new_change(sn);
      }
      sn
    };
    self.work_queue.enqueue(self.guid.entity_id);
    Ok(sn)
  }

  /// Matches a remote reader. All changes already in the history are
  /// scheduled for it, so a late-joining reliable reader still gets
  /// everything the history retains. A proxy with the same GUID
  /// replaces the old one.
  pub fn add_matched_reader(&self, mut proxy: RtpsReaderProxy) {
    {
      let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
      inner
        .reader_proxies
        .retain(|p| p.remote_reader_guid != proxy.remote_reader_guid);
      let mut sn = inner.history.min_available_sn().unwrap_or_default();
      while sn <= inner.last_change_sn {
        proxy.notify_new_change(sn);
        sn = sn.next();
      }
      debug!(
        "writer {:?} matched reader {:?}",
        self.guid, proxy.remote_reader_guid
      );
      inner.reader_proxies.push(proxy);
    }
    self.work_queue.enqueue(self.guid.entity_id);
  }

  pub fn remove_matched_reader(&self, reader_guid: Guid) {
    let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
    inner
      .reader_proxies
      .retain(|p| p.remote_reader_guid != reader_guid);
  }

  pub fn is_matched_to(&self, reader_guid: Guid) -> bool {
    let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
    inner
      .reader_proxies
      .iter()
      .any(|p| p.remote_reader_guid == reader_guid)
  }

  /// Processes an ACKNACK arriving from `source_prefix`.
  pub fn handle_acknack(&self, source_prefix: GuidPrefix, acknack: &AckNack, final_flag: bool) {
    let more_work = {
      let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
      let last_available = inner.last_change_sn;
      let reader_guid = Guid::new(source_prefix, acknack.reader_id);
      match inner
        .reader_proxies
        .iter_mut()
        .find(|p| p.remote_reader_guid == reader_guid)
      {
        Some(proxy) => {
          proxy.handle_acknack(acknack, last_available, final_flag) && proxy.has_unsent()
        }
        None => {
          debug!("ACKNACK from unmatched reader {reader_guid:?}, dropped");
          false
        }
      }
    };
    if more_work {
      self.work_queue.enqueue(self.guid.entity_id);
    }
  }

  /// One round of outbound progress: per reader at most one DATA
  /// (lowest pending first) plus a HEARTBEAT when the period elapsed.
  /// Called from a writer thread.
  pub fn progress(&self) {
    let now = Instant::now();
    let mut outgoing: Vec<(Locator, Bytes)> = Vec::new();
    let mut more_work = false;
    {
      let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
      let Inner {
        history,
        last_change_sn,
        reader_proxies,
      } = &mut *inner;
      let last_sn = *last_change_sn;

      for proxy in reader_proxies.iter_mut() {
        if let Some(sn) = proxy.first_unsent() {
          match history.get_change(sn) {
            Some(change) => {
              let message = MessageBuilder::new(self.guid.prefix, self.vendor_id)
                .info_dst(proxy.remote_reader_guid.prefix)
                .info_ts(Some(Timestamp::now()))
                .data(
                  proxy.remote_reader_guid.entity_id,
                  self.guid.entity_id,
                  sn,
                  Some(change.data_value.clone()),
                )
                .take();
              outgoing.push((proxy.remote_locator, message));
            }
            None => {
              // Evicted before it was ever sent; the heartbeat's
              // firstSN tells the reader to stop waiting for it.
              trace!("change {sn:?} already evicted, not sending");
            }
          }
          proxy.mark_change_sent(sn);
          if proxy.has_unsent() {
            more_work = true;
          }
        }

        // No heartbeat before the first change exists to advertise.
        if proxy.is_reliable
          && last_sn > SequenceNumber::zero()
          && proxy.heartbeat_due(now, self.heartbeat_period)
        {
          let first_sn = history.min_available_sn().unwrap_or(last_sn.next());
          let count = proxy.next_heartbeat_count();
          let message = MessageBuilder::new(self.guid.prefix, self.vendor_id)
            .info_dst(proxy.remote_reader_guid.prefix)
            .heartbeat(
              proxy.remote_reader_guid.entity_id,
              self.guid.entity_id,
              first_sn,
              last_sn,
              count,
              false, // FINAL clear: the reader must respond
            )
            .take();
          outgoing.push((proxy.remote_locator, message));
        }
      }
    }
    // Transport is called only after the writer mutex is released.
    for (locator, bytes) in outgoing {
      self.transport.send(&locator, &bytes);
    }
    if more_work {
      self.work_queue.enqueue(self.guid.entity_id);
    }
  }

  pub fn last_change_sn(&self) -> SequenceNumber {
    self
      .inner
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .last_change_sn
  }

  /// Snapshot of (min available, highest acked by the given reader),
  /// for inspection in tests and diagnostics.
  pub fn ack_state(&self, reader_guid: Guid) -> Option<(Option<SequenceNumber>, SequenceNumber)> {
    let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
    let min = inner.history.min_available_sn();
    inner
      .reader_proxies
      .iter()
      .find(|p| p.remote_reader_guid == reader_guid)
      .map(|p| (min, p.highest_acked()))
  }
}
