use speedy::{Readable, Writable};

use crate::structure::guid::GuidPrefix;

/// Modifies the GuidPrefix used to reconstruct the Reader GUIDs in the
/// submessages that follow within the same message.
#[derive(Debug, PartialEq, Eq, Clone, Readable, Writable)]
pub struct InfoDestination {
  pub guid_prefix: GuidPrefix,
}
