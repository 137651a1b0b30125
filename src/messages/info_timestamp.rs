use crate::structure::time::Timestamp;

/// Provides the source timestamp for the submessages that follow.
/// With the INVALIDATE flag set the submessage carries no payload and
/// cancels any earlier timestamp context.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct InfoTimestamp {
  /// `None` when the INVALIDATE flag is set.
  pub timestamp: Option<Timestamp>,
}
