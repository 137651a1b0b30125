use std::collections::VecDeque;

#[allow(unused_imports)]
use log::{debug, trace, warn};

use crate::structure::cache_change::CacheChange;
use crate::structure::sequence_number::SequenceNumber;

struct ChangeSlot {
  change: CacheChange,
  sent: bool,
}

/// Bounded writer-side store of [`CacheChange`]s, ordered by strictly
/// increasing sequence number. When full, the oldest change is evicted
/// and becomes unavailable for retransmission; HEARTBEAT advertises the
/// eviction watermark as `firstSN`.
///
/// The `sent` marker per slot serves stateless writers, which have no
/// per-proxy bookkeeping. Stateful writers track per-reader send state
/// in their `RtpsReaderProxy` instead.
pub struct HistoryCache {
  capacity: usize,
  changes: VecDeque<ChangeSlot>,
}

impl HistoryCache {
  pub fn with_capacity(capacity: usize) -> HistoryCache {
    assert!(capacity > 0);
    HistoryCache {
      capacity,
      changes: VecDeque::with_capacity(capacity),
    }
  }

  /// Stores a change, evicting the oldest one when at capacity. Returns
  /// the evicted change, if any.
  ///
  /// Changes must arrive in increasing sequence-number order; the writer
  /// allocates them from a single counter under its own mutex.
  pub fn add_change(&mut self, change: CacheChange) -> Option<CacheChange> {
    if let Some(back) = self.changes.back() {
      debug_assert!(back.change.sequence_number < change.sequence_number);
    }
    let evicted = if self.changes.len() == self.capacity {
      let slot = self.changes.pop_front();
      slot.map(|s| {
        trace!(
          "history full, evicting {:?} of {:?}",
          s.change.sequence_number,
          s.change.writer_guid
        );
        s.change
      })
    } else {
      None
    };
    self.changes.push_back(ChangeSlot {
      change,
      sent: false,
    });
    evicted
  }

  /// Drops the change with the given sequence number, if stored.
  pub fn remove_change(&mut self, sn: SequenceNumber) -> Option<CacheChange> {
    let index = self.position(sn)?;
    self.changes.remove(index).map(|slot| slot.change)
  }

  pub fn get_change(&self, sn: SequenceNumber) -> Option<&CacheChange> {
    self.position(sn).map(|i| &self.changes[i].change)
  }

  /// Lowest-numbered change not yet marked sent.
  pub fn next_unsent(&self) -> Option<&CacheChange> {
    self
      .changes
      .iter()
      .find(|slot| !slot.sent)
      .map(|slot| &slot.change)
  }

  pub fn mark_sent(&mut self, sn: SequenceNumber) {
    if let Some(index) = self.position(sn) {
      self.changes[index].sent = true;
    }
  }

  /// Re-marks every stored change for transmission (periodic resend of
  /// discovery announcements).
  pub fn reset_send(&mut self) {
    for slot in &mut self.changes {
      slot.sent = false;
    }
  }

  /// Lowest sequence number still retrievable. `None` when the history
  /// holds nothing.
  pub fn min_available_sn(&self) -> Option<SequenceNumber> {
    self.changes.front().map(|s| s.change.sequence_number)
  }

  pub fn max_sn(&self) -> Option<SequenceNumber> {
    self.changes.back().map(|s| s.change.sequence_number)
  }

  pub fn is_empty(&self) -> bool {
    self.changes.is_empty()
  }

  pub fn len(&self) -> usize {
    self.changes.len()
  }

  fn position(&self, sn: SequenceNumber) -> Option<usize> {
    // Slots are SN-ordered, so a binary search would do, but histories
    // are at most tens of entries deep.
    self
      .changes
      .iter()
      .position(|slot| slot.change.sequence_number == sn)
  }
}

#[cfg(test)]
mod tests {
  use bytes::Bytes;

  use super::*;
  use crate::structure::cache_change::ChangeKind;
  use crate::structure::guid::Guid;

  fn change(sn: i64) -> CacheChange {
    CacheChange::new(
      ChangeKind::ALIVE,
      Guid::UNKNOWN,
      SequenceNumber::from(sn),
      Bytes::from_static(b"x"),
    )
  }

  #[test]
  fn overflow_evicts_oldest_and_advances_min() {
    let mut history = HistoryCache::with_capacity(4);
    for sn in 1..=6 {
      history.add_change(change(sn));
    }
    assert_eq!(history.len(), 4);
    assert_eq!(history.min_available_sn(), Some(SequenceNumber::from(3)));
    assert_eq!(history.max_sn(), Some(SequenceNumber::from(6)));
    assert!(history.get_change(SequenceNumber::from(2)).is_none());
    assert!(history.get_change(SequenceNumber::from(3)).is_some());
  }

  #[test]
  fn next_unsent_returns_lowest_and_respects_marks() {
    let mut history = HistoryCache::with_capacity(4);
    history.add_change(change(1));
    history.add_change(change(2));

    assert_eq!(
      history.next_unsent().map(|c| c.sequence_number),
      Some(SequenceNumber::from(1))
    );
    history.mark_sent(SequenceNumber::from(1));
    assert_eq!(
      history.next_unsent().map(|c| c.sequence_number),
      Some(SequenceNumber::from(2))
    );
    history.mark_sent(SequenceNumber::from(2));
    assert!(history.next_unsent().is_none());

    history.reset_send();
    assert_eq!(
      history.next_unsent().map(|c| c.sequence_number),
      Some(SequenceNumber::from(1))
    );
  }

  #[test]
  fn remove_keeps_remaining_order() {
    let mut history = HistoryCache::with_capacity(4);
    for sn in 1..=3 {
      history.add_change(change(sn));
    }
    let removed = history.remove_change(SequenceNumber::from(2));
    assert_eq!(
      removed.map(|c| c.sequence_number),
      Some(SequenceNumber::from(2))
    );
    assert_eq!(history.len(), 2);
    assert_eq!(history.min_available_sn(), Some(SequenceNumber::from(1)));
    assert_eq!(history.max_sn(), Some(SequenceNumber::from(3)));
  }
}
