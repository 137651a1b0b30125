use std::collections::BTreeSet;

#[allow(unused_imports)]
use log::{debug, trace, warn};

use crate::messages::heartbeat::Heartbeat;
use crate::structure::count::Count;
use crate::structure::guid::Guid;
use crate::structure::locator::Locator;
use crate::structure::sequence_number::{SequenceNumber, SequenceNumberSet};

/// What a StatefulReader maintains about one matched remote Writer.
///
/// `expected_sn` is the lowest sequence number that has neither been
/// delivered nor recorded as missing; everything below it is either
/// delivered or in `missing`. Samples are not reordered: a change
/// arriving ahead of a gap is delivered immediately and the gap is
/// repaired by retransmission.
#[derive(Debug)]
pub(crate) struct RtpsWriterProxy {
  /// The matched remote Writer.
  pub remote_writer_guid: Guid,
  /// The writer's unicast locator, target of ACKNACKs.
  pub remote_locator: Locator,

  expected_sn: SequenceNumber,
  missing: BTreeSet<SequenceNumber>,
  // Count of the newest heartbeat seen; stale heartbeats are dropped.
  last_heartbeat_count: Count,
  // Count series for ACKNACKs towards this writer.
  acknack_count: Count,
}

/// What to do with an arriving DATA submessage.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum DataDisposition {
  Deliver,
  Duplicate,
}

impl RtpsWriterProxy {
  pub fn new(remote_writer_guid: Guid, remote_locator: Locator) -> Self {
    Self {
      remote_writer_guid,
      remote_locator,
      expected_sn: SequenceNumber::default(),
      missing: BTreeSet::new(),
      last_heartbeat_count: Count::default(),
      acknack_count: Count::default(),
    }
  }

  pub fn expected_sn(&self) -> SequenceNumber {
    self.expected_sn
  }

  pub fn has_missing(&self) -> bool {
    !self.missing.is_empty()
  }

  /// Classifies an arriving change and updates the bookkeeping.
  pub fn handle_data_sn(&mut self, sn: SequenceNumber) -> DataDisposition {
    if sn == self.expected_sn {
      self.expected_sn = sn.next();
      return DataDisposition::Deliver;
    }
    if sn < self.expected_sn {
      // A gap being repaired, or a duplicate of something delivered.
      if self.missing.remove(&sn) {
        return DataDisposition::Deliver;
      }
      return DataDisposition::Duplicate;
    }
    // Ahead of order: deliver now, remember the gap for repair.
    let mut gap_sn = self.expected_sn;
    while gap_sn < sn {
      self.missing.insert(gap_sn);
      gap_sn = gap_sn.next();
    }
    self.expected_sn = sn.next();
    DataDisposition::Deliver
  }

  /// Processes a heartbeat; returns `false` when the count is stale and
  /// the heartbeat must produce no reaction at all.
  pub fn handle_heartbeat(&mut self, heartbeat: &Heartbeat) -> bool {
    if Count::from(heartbeat.count) <= self.last_heartbeat_count {
      debug!(
        "stale HEARTBEAT count {} (last {:?}) from {:?}",
        heartbeat.count, self.last_heartbeat_count, self.remote_writer_guid
      );
      return false;
    }
    self.last_heartbeat_count = Count::from(heartbeat.count);

    // Changes below firstSN are evicted at the writer: unrecoverable.
    let unrecoverable: Vec<SequenceNumber> = self
      .missing
      .range(..heartbeat.first_sn)
      .copied()
      .collect();
    if !unrecoverable.is_empty() {
      warn!(
        "giving up on {} changes evicted by {:?}",
        unrecoverable.len(),
        self.remote_writer_guid
      );
      for sn in unrecoverable {
        self.missing.remove(&sn);
      }
    }
    if self.expected_sn < heartbeat.first_sn {
      self.expected_sn = heartbeat.first_sn;
    }

    // Everything advertised but never observed is missing.
    while self.expected_sn <= heartbeat.last_sn {
      self.missing.insert(self.expected_sn);
      self.expected_sn = self.expected_sn.next();
    }
    true
  }

  /// Builds the readerSNState for an ACKNACK: base at the lowest
  /// missing change (or at `expected_sn` when nothing is missing), set
  /// bits at every missing change.
  pub fn missing_sn_state(&self) -> SequenceNumberSet {
    let base = self
      .missing
      .iter()
      .next()
      .copied()
      .unwrap_or(self.expected_sn);
    let mut state = SequenceNumberSet::new_empty(base);
    for sn in &self.missing {
      if !state.insert(*sn) {
        // More than 256 outstanding; the rest is requested on the next
        // heartbeat round.
        trace!("missing set exceeds ACKNACK window, truncating");
        break;
      }
    }
    state
  }

  pub fn next_acknack_count(&mut self) -> i32 {
    self.acknack_count.next().into()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::structure::guid::EntityId;

  fn proxy() -> RtpsWriterProxy {
    RtpsWriterProxy::new(Guid::UNKNOWN, Locator::INVALID)
  }

  fn heartbeat(first: i64, last: i64, count: i32) -> Heartbeat {
    Heartbeat {
      reader_id: EntityId::UNKNOWN,
      writer_id: EntityId::UNKNOWN,
      first_sn: SequenceNumber::from(first),
      last_sn: SequenceNumber::from(last),
      count,
    }
  }

  #[test]
  fn in_order_delivery_advances_expected() {
    let mut proxy = proxy();
    assert_eq!(
      proxy.handle_data_sn(SequenceNumber::from(1)),
      DataDisposition::Deliver
    );
    assert_eq!(
      proxy.handle_data_sn(SequenceNumber::from(2)),
      DataDisposition::Deliver
    );
    assert_eq!(proxy.expected_sn(), SequenceNumber::from(3));
    assert!(!proxy.has_missing());
  }

  #[test]
  fn duplicate_is_suppressed() {
    let mut proxy = proxy();
    proxy.handle_data_sn(SequenceNumber::from(1));
    assert_eq!(
      proxy.handle_data_sn(SequenceNumber::from(1)),
      DataDisposition::Duplicate
    );
  }

  #[test]
  fn gap_is_recorded_and_repaired_once() {
    let mut proxy = proxy();
    proxy.handle_data_sn(SequenceNumber::from(1));
    proxy.handle_data_sn(SequenceNumber::from(2));
    // 3 lost, 4 and 5 arrive
    assert_eq!(
      proxy.handle_data_sn(SequenceNumber::from(4)),
      DataDisposition::Deliver
    );
    assert_eq!(
      proxy.handle_data_sn(SequenceNumber::from(5)),
      DataDisposition::Deliver
    );
    assert!(proxy.has_missing());

    // retransmitted 3 is a repair, its second copy a duplicate
    assert_eq!(
      proxy.handle_data_sn(SequenceNumber::from(3)),
      DataDisposition::Deliver
    );
    assert_eq!(
      proxy.handle_data_sn(SequenceNumber::from(3)),
      DataDisposition::Duplicate
    );
    assert!(!proxy.has_missing());
  }

  #[test]
  fn heartbeat_count_gating() {
    let mut proxy = proxy();
    assert!(proxy.handle_heartbeat(&heartbeat(1, 0, 1)));
    assert!(!proxy.handle_heartbeat(&heartbeat(1, 0, 1)));
    assert!(!proxy.handle_heartbeat(&heartbeat(1, 0, 0)));
    assert!(proxy.handle_heartbeat(&heartbeat(1, 0, 2)));
  }

  #[test]
  fn acknack_base_points_at_lowest_missing() {
    let mut proxy = proxy();
    proxy.handle_data_sn(SequenceNumber::from(1));
    proxy.handle_data_sn(SequenceNumber::from(2));
    proxy.handle_data_sn(SequenceNumber::from(4));
    proxy.handle_data_sn(SequenceNumber::from(5));
    assert!(proxy.handle_heartbeat(&heartbeat(1, 5, 1)));

    let state = proxy.missing_sn_state();
    assert_eq!(state.base(), SequenceNumber::from(3));
    assert_eq!(state.iter().collect::<Vec<_>>(), vec![SequenceNumber::from(3)]);
  }

  #[test]
  fn heartbeat_marks_unseen_changes_missing() {
    let mut proxy = proxy();
    // every DATA of 1..=5 lost; only the heartbeat arrives
    assert!(proxy.handle_heartbeat(&heartbeat(1, 5, 1)));
    let state = proxy.missing_sn_state();
    assert_eq!(state.base(), SequenceNumber::from(1));
    assert_eq!(state.iter().count(), 5);
  }

  #[test]
  fn evicted_changes_are_abandoned() {
    let mut proxy = proxy();
    proxy.handle_data_sn(SequenceNumber::from(4)); // 1..3 lost
    assert!(proxy.handle_heartbeat(&heartbeat(3, 4, 1)));
    // 1 and 2 were evicted at the writer, only 3 remains requestable
    let state = proxy.missing_sn_state();
    assert_eq!(state.iter().collect::<Vec<_>>(), vec![SequenceNumber::from(3)]);
  }
}
