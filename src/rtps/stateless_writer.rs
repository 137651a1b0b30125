use std::sync::{Arc, Mutex};

use bytes::Bytes;
#[allow(unused_imports)]
use log::{debug, trace, warn};

use crate::error::HistoryError;
use crate::messages::message::MessageBuilder;
use crate::messages::vendor_id::VendorId;
use crate::network::transport::Transport;
use crate::structure::cache_change::{CacheChange, ChangeKind};
use crate::structure::guid::{EntityId, Guid};
use crate::structure::history_cache::HistoryCache;
use crate::structure::locator::Locator;
use crate::structure::sequence_number::SequenceNumber;
use crate::structure::time::Timestamp;
use crate::structure::topic_data::TopicData;
use crate::thread_pool::WorkQueue;

/// Best-effort writer without per-reader state. Sends every unsent
/// change to a fixed set of locators; retransmission happens only when
/// someone calls [`unsent_changes_reset`](Self::unsent_changes_reset),
/// which is how SPDP re-announces on its period.
pub struct StatelessWriter {
  guid: Guid,
  topic: TopicData,
  vendor_id: VendorId,
  transport: Arc<dyn Transport>,
  work_queue: WorkQueue,
  inner: Mutex<Inner>,
}

struct Inner {
  history: HistoryCache,
  last_change_sn: SequenceNumber,
  reader_locators: Vec<Locator>,
}

impl StatelessWriter {
  pub fn new(
    guid: Guid,
    topic: TopicData,
    history_depth: usize,
    transport: Arc<dyn Transport>,
    work_queue: WorkQueue,
    vendor_id: VendorId,
  ) -> StatelessWriter {
    StatelessWriter {
      guid,
      topic,
      vendor_id,
      transport,
      work_queue,
      inner: Mutex::new(Inner {
        history: HistoryCache::with_capacity(history_depth),
        last_change_sn: SequenceNumber::zero(),
        reader_locators: Vec::new(),
      }),
    }
  }

  pub fn guid(&self) -> Guid {
    self.guid
  }

  pub fn topic(&self) -> &TopicData {
    &self.topic
  }

  pub fn add_reader_locator(&self, locator: Locator) {
    let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
    if !inner.reader_locators.contains(&locator) {
      inner.reader_locators.push(locator);
    }
  }

  /// Appends a change to the history and schedules transmission.
  /// Returns the assigned sequence number.
  pub fn new_change(&self, kind: ChangeKind, data: Bytes) -> Result<SequenceNumber, HistoryError> {
    if self.is_irrelevant(kind) {
      return Err(HistoryError::RejectedKind);
    }
    let sn = {
      let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
      inner.last_change_sn = inner.last_change_sn.next();
      let sn = inner.last_change_sn;
      inner.history.add_change(CacheChange::new(kind, self.guid, sn, data));
      sn
    };
    self.work_queue.enqueue(self.guid.entity_id);
    Ok(sn)
  }

  /// Marks everything for retransmission and schedules work.
  pub fn unsent_changes_reset(&self) {
    self
      .inner
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .history
      .reset_send();
    self.work_queue.enqueue(self.guid.entity_id);
  }

  /// Serializes every unsent change into one message per locator.
  /// Called from a writer thread.
  pub fn progress(&self) {
    let mut outgoing: Vec<(Locator, Bytes)> = Vec::new();
    {
      let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
      if inner.reader_locators.is_empty() {
        trace!("stateless writer {:?} has no reader locators", self.guid);
        return;
      }

      let mut builder = MessageBuilder::new(self.guid.prefix, self.vendor_id)
        .info_ts(Some(Timestamp::now()))
        .info_dst(crate::structure::guid::GuidPrefix::UNKNOWN);
      let mut sent_any = false;
      while let Some(change) = inner.history.next_unsent() {
        let sn = change.sequence_number;
        let payload = change.data_value.clone();
        builder = builder.data(EntityId::UNKNOWN, self.guid.entity_id, sn, Some(payload));
        inner.history.mark_sent(sn);
        sent_any = true;
      }
      if sent_any {
        let bytes = builder.take();
        for locator in &inner.reader_locators {
          outgoing.push((*locator, bytes.clone()));
        }
      }
    }
    // Transport is called only after the writer mutex is released.
    for (locator, bytes) in outgoing {
      self.transport.send(&locator, &bytes);
    }
  }

  pub fn last_change_sn(&self) -> SequenceNumber {
    self
      .inner
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .last_change_sn
  }

  fn is_irrelevant(&self, kind: ChangeKind) -> bool {
    !self.topic.topic_kind.has_key() && kind != ChangeKind::ALIVE
  }
}
