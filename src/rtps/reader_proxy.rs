use std::collections::BTreeSet;
use std::time::{Duration, Instant};

#[allow(unused_imports)]
use log::{debug, trace, warn};

use crate::messages::ack_nack::AckNack;
use crate::structure::count::Count;
use crate::structure::guid::Guid;
use crate::structure::locator::Locator;
use crate::structure::sequence_number::SequenceNumber;

/// What a StatefulWriter maintains about one matched remote Reader.
#[derive(Debug)]
pub(crate) struct RtpsReaderProxy {
  /// The matched remote Reader.
  pub remote_reader_guid: Guid,
  /// Where DATA and HEARTBEAT for this reader are sent.
  pub remote_locator: Locator,
  pub expects_inline_qos: bool,
  pub is_reliable: bool,

  // The reader has positively acknowledged everything below this.
  // Equals readerSNState.base of the newest ACKNACK.
  all_acked_before: SequenceNumber,
  // Sequence numbers still to transmit: never sent, or NACKed.
  unsent_changes: BTreeSet<SequenceNumber>,
  // Count of the newest ACKNACK seen; stale counts are discarded.
  last_acknack_count: Count,
  // Count series for heartbeats towards this reader.
  heartbeat_count: Count,
  last_heartbeat: Option<Instant>,
  // A FINAL-flagged ACKNACK suppresses the next periodic heartbeat.
  heartbeat_suppressed: bool,
}

impl RtpsReaderProxy {
  pub fn new(
    remote_reader_guid: Guid,
    remote_locator: Locator,
    is_reliable: bool,
    expects_inline_qos: bool,
  ) -> Self {
    Self {
      remote_reader_guid,
      remote_locator,
      expects_inline_qos,
      is_reliable,
      all_acked_before: SequenceNumber::default(), // nothing below 1 exists
      unsent_changes: BTreeSet::new(),
      last_acknack_count: Count::default(),
      heartbeat_count: Count::default(),
      last_heartbeat: None,
      heartbeat_suppressed: false,
    }
  }

  /// Called for every change added to the writer's history.
  pub fn notify_new_change(&mut self, sn: SequenceNumber) {
    self.unsent_changes.insert(sn);
    self.heartbeat_suppressed = false;
  }

  pub fn first_unsent(&self) -> Option<SequenceNumber> {
    self.unsent_changes.iter().next().copied()
  }

  pub fn has_unsent(&self) -> bool {
    !self.unsent_changes.is_empty()
  }

  pub fn mark_change_sent(&mut self, sn: SequenceNumber) {
    self.unsent_changes.remove(&sn);
  }

  /// The highest sequence number the reader has positively acked;
  /// 0 when nothing is acked yet.
  pub fn highest_acked(&self) -> SequenceNumber {
    self.all_acked_before + (-1)
  }

  /// Processes an ACKNACK from this reader. Returns `false` when the
  /// count is stale and the message must be ignored.
  pub fn handle_acknack(
    &mut self,
    acknack: &AckNack,
    last_available: SequenceNumber,
    final_flag: bool,
  ) -> bool {
    if Count::from(acknack.count) <= self.last_acknack_count {
      debug!(
        "stale ACKNACK count {} (last {:?}) from {:?}",
        acknack.count, self.last_acknack_count, self.remote_reader_guid
      );
      return false;
    }
    self.last_acknack_count = Count::from(acknack.count);

    let new_all_acked_before = acknack.reader_sn_state.base();
    if new_all_acked_before < self.all_acked_before {
      warn!(
        "ACKNACK moves ack watermark backwards: {:?} -> {:?} from {:?}",
        self.all_acked_before, new_all_acked_before, self.remote_reader_guid
      );
    } else {
      self.all_acked_before = new_all_acked_before;
    }
    // Everything below the watermark needs no (re)transmission.
    self.unsent_changes = self.unsent_changes.split_off(&self.all_acked_before);

    // Requested changes; asking beyond what exists is unreasonable and
    // gets truncated.
    for nack_sn in acknack.reader_sn_state.iter() {
      if nack_sn <= last_available {
        self.unsent_changes.insert(nack_sn);
      } else {
        trace!(
          "{:?} requests {:?} but only up to {:?} exists",
          self.remote_reader_guid,
          nack_sn,
          last_available
        );
      }
    }

    if final_flag {
      self.heartbeat_suppressed = true;
    }
    true
  }

  /// Whether a periodic heartbeat should go out now; advances the
  /// period clock when it does. A FINAL ACKNACK skips one beat.
  pub fn heartbeat_due(&mut self, now: Instant, period: Duration) -> bool {
    if self.heartbeat_suppressed {
      self.heartbeat_suppressed = false;
      return false;
    }
    match self.last_heartbeat {
      Some(previous) if now.duration_since(previous) < period => false,
      _ => {
        self.last_heartbeat = Some(now);
        true
      }
    }
  }

  pub fn next_heartbeat_count(&mut self) -> i32 {
    self.heartbeat_count.next().into()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::structure::sequence_number::SequenceNumberSet;

  fn proxy() -> RtpsReaderProxy {
    RtpsReaderProxy::new(Guid::UNKNOWN, Locator::INVALID, true, false)
  }

  fn acknack(base: i64, missing: &[i64], count: i32) -> AckNack {
    let mut reader_sn_state = SequenceNumberSet::new_empty(SequenceNumber::from(base));
    for sn in missing {
      reader_sn_state.insert(SequenceNumber::from(*sn));
    }
    AckNack {
      reader_id: crate::structure::guid::EntityId::UNKNOWN,
      writer_id: crate::structure::guid::EntityId::UNKNOWN,
      reader_sn_state,
      count,
    }
  }

  #[test]
  fn unsent_changes_come_out_lowest_first() {
    let mut proxy = proxy();
    proxy.notify_new_change(SequenceNumber::from(2));
    proxy.notify_new_change(SequenceNumber::from(1));
    assert_eq!(proxy.first_unsent(), Some(SequenceNumber::from(1)));
    proxy.mark_change_sent(SequenceNumber::from(1));
    assert_eq!(proxy.first_unsent(), Some(SequenceNumber::from(2)));
  }

  #[test]
  fn acknack_acks_below_base_and_requests_bitmap() {
    let mut proxy = proxy();
    for sn in 1..=5 {
      proxy.notify_new_change(SequenceNumber::from(sn));
      proxy.mark_change_sent(SequenceNumber::from(sn));
    }
    assert!(proxy.handle_acknack(&acknack(3, &[3], 1), SequenceNumber::from(5), false));
    assert_eq!(proxy.highest_acked(), SequenceNumber::from(2));
    assert_eq!(proxy.first_unsent(), Some(SequenceNumber::from(3)));
  }

  #[test]
  fn stale_acknack_count_is_ignored() {
    let mut proxy = proxy();
    assert!(proxy.handle_acknack(&acknack(2, &[], 5), SequenceNumber::from(5), false));
    assert!(!proxy.handle_acknack(&acknack(3, &[], 5), SequenceNumber::from(5), false));
    assert!(!proxy.handle_acknack(&acknack(3, &[], 4), SequenceNumber::from(5), false));
    assert_eq!(proxy.highest_acked(), SequenceNumber::from(1));
  }

  #[test]
  fn requests_beyond_last_available_are_truncated() {
    let mut proxy = proxy();
    assert!(proxy.handle_acknack(&acknack(1, &[1, 9], 1), SequenceNumber::from(3), false));
    assert_eq!(proxy.first_unsent(), Some(SequenceNumber::from(1)));
    proxy.mark_change_sent(SequenceNumber::from(1));
    assert!(!proxy.has_unsent());
  }

  #[test]
  fn final_acknack_suppresses_one_heartbeat() {
    let mut proxy = proxy();
    let period = Duration::from_millis(0);
    let now = Instant::now();
    assert!(proxy.handle_acknack(&acknack(1, &[], 1), SequenceNumber::zero(), true));
    assert!(!proxy.heartbeat_due(now, period));
    assert!(proxy.heartbeat_due(now, period));
  }

  #[test]
  fn heartbeat_respects_period() {
    let mut proxy = proxy();
    let period = Duration::from_secs(3600);
    let now = Instant::now();
    assert!(proxy.heartbeat_due(now, period));
    assert!(!proxy.heartbeat_due(now, period));
  }
}
