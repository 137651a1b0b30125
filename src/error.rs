//! Error types, one enum per failure domain.
//!
//! A uniform error type is not used for the whole crate, because most
//! operations can only fail in a small subset of ways. Remote-peer
//! misbehavior (stale counts, unknown GUID prefixes) is never an error
//! to the caller: such packets are dropped and logged at the dispatcher
//! boundary.

use crate::structure::sequence_number::SequenceNumber;

/// Errors from parsing an inbound RTPS message. Any of these causes the
/// whole datagram to be dropped.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
  /// Bad framing: wrong magic, unsupported protocol major version,
  /// truncated submessage, or a length field pointing past the end of
  /// the datagram.
  #[error("malformed RTPS message: {reason}")]
  Malformed { reason: String },

  /// A parameter list element whose declared length overruns the buffer.
  #[error("parameter length {length} overruns remaining {remaining} bytes")]
  ParameterOverrun { length: usize, remaining: usize },
}

impl MessageError {
  pub(crate) fn malformed(reason: impl Into<String>) -> Self {
    Self::Malformed {
      reason: reason.into(),
    }
  }
}

/// Errors from writer-side history operations.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
  /// The change kind is not acceptable for this writer, e.g. a disposal
  /// on a NO_KEY topic.
  #[error("change kind rejected for this topic kind")]
  RejectedKind,

  /// No free slot and the oldest change may not be evicted yet.
  #[error("history full, cannot store sequence number {0:?}")]
  Full(SequenceNumber),
}

/// Errors surfaced through the public participant API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
  /// Operation requires a started participant.
  #[error("participant is not started")]
  NotInitialized,

  /// A worker thread panicked while holding a lock; the participant is
  /// no longer usable.
  #[error("internal lock poisoned: {reason}")]
  Poisoned { reason: String },

  /// Socket setup failed.
  #[error("transport error: {0}")]
  Transport(#[from] std::io::Error),

  /// The writer-side history refused the change.
  #[error(transparent)]
  History(#[from] HistoryError),
}
