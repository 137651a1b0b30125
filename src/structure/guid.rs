use std::fmt;

use speedy::{Context, Readable, Reader, Writable, Writer};

/// Opaque 12-byte identifier of a Participant. All Entities of one
/// Participant share its GuidPrefix.
#[derive(Copy, Clone, Default, PartialOrd, PartialEq, Ord, Eq, Hash)]
pub struct GuidPrefix {
  pub bytes: [u8; 12],
}

impl GuidPrefix {
  pub const UNKNOWN: GuidPrefix = GuidPrefix { bytes: [0x00; 12] };

  pub fn new(bytes: [u8; 12]) -> Self {
    Self { bytes }
  }
}

impl fmt::Debug for GuidPrefix {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for b in &self.bytes {
      write!(f, "{b:02x}")?;
    }
    Ok(())
  }
}

impl<'a, C: Context> Readable<'a, C> for GuidPrefix {
  #[inline]
  fn read_from<R: Reader<'a, C>>(reader: &mut R) -> Result<Self, C::Error> {
    let mut guid_prefix = GuidPrefix::default();
    reader.read_bytes(&mut guid_prefix.bytes)?;
    Ok(guid_prefix)
  }

  #[inline]
  fn minimum_bytes_needed() -> usize {
    12
  }
}

impl<C: Context> Writable<C> for GuidPrefix {
  #[inline]
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    writer.write_bytes(&self.bytes)
  }
}

/// The 1-byte kind part of an [`EntityId`]. Encodes builtin vs.
/// user-defined, reader vs. writer, and with-key vs. no-key.
#[derive(Copy, Clone, Debug, PartialOrd, PartialEq, Ord, Eq, Hash, Readable, Writable)]
pub struct EntityKind {
  value: u8,
}

impl EntityKind {
  pub const USER_DEFINED_UNKNOWN: EntityKind = EntityKind { value: 0x00 };
  pub const USER_DEFINED_WRITER_WITH_KEY: EntityKind = EntityKind { value: 0x02 };
  pub const USER_DEFINED_WRITER_NO_KEY: EntityKind = EntityKind { value: 0x03 };
  pub const USER_DEFINED_READER_NO_KEY: EntityKind = EntityKind { value: 0x04 };
  pub const USER_DEFINED_READER_WITH_KEY: EntityKind = EntityKind { value: 0x07 };

  pub const BUILTIN_UNKNOWN: EntityKind = EntityKind { value: 0xC0 };
  pub const BUILTIN_PARTICIPANT: EntityKind = EntityKind { value: 0xC1 };
  pub const BUILTIN_WRITER_WITH_KEY: EntityKind = EntityKind { value: 0xC2 };
  pub const BUILTIN_WRITER_NO_KEY: EntityKind = EntityKind { value: 0xC3 };
  pub const BUILTIN_READER_NO_KEY: EntityKind = EntityKind { value: 0xC4 };
  pub const BUILTIN_READER_WITH_KEY: EntityKind = EntityKind { value: 0xC7 };

  pub fn is_builtin(self) -> bool {
    (self.value & 0xC0) == 0xC0
  }

  pub fn is_writer(self) -> bool {
    matches!(self.value & 0x0F, 0x02 | 0x03)
  }

  pub fn is_reader(self) -> bool {
    matches!(self.value & 0x0F, 0x04 | 0x07)
  }
}

/// Identifies an Entity within its Participant: 3-byte key plus kind.
#[derive(Copy, Clone, Debug, PartialOrd, PartialEq, Ord, Eq, Hash)]
pub struct EntityId {
  pub entity_key: [u8; 3],
  pub entity_kind: EntityKind,
}

impl EntityId {
  pub const UNKNOWN: EntityId = EntityId {
    entity_key: [0x00; 3],
    entity_kind: EntityKind::USER_DEFINED_UNKNOWN,
  };
  pub const PARTICIPANT: EntityId = EntityId {
    entity_key: [0x00, 0x00, 0x01],
    entity_kind: EntityKind::BUILTIN_PARTICIPANT,
  };
  pub const SEDP_BUILTIN_PUBLICATIONS_WRITER: EntityId = EntityId {
    entity_key: [0x00, 0x00, 0x03],
    entity_kind: EntityKind::BUILTIN_WRITER_WITH_KEY,
  };
  pub const SEDP_BUILTIN_PUBLICATIONS_READER: EntityId = EntityId {
    entity_key: [0x00, 0x00, 0x03],
    entity_kind: EntityKind::BUILTIN_READER_WITH_KEY,
  };
  pub const SEDP_BUILTIN_SUBSCRIPTIONS_WRITER: EntityId = EntityId {
    entity_key: [0x00, 0x00, 0x04],
    entity_kind: EntityKind::BUILTIN_WRITER_WITH_KEY,
  };
  pub const SEDP_BUILTIN_SUBSCRIPTIONS_READER: EntityId = EntityId {
    entity_key: [0x00, 0x00, 0x04],
    entity_kind: EntityKind::BUILTIN_READER_WITH_KEY,
  };
  pub const SPDP_BUILTIN_PARTICIPANT_WRITER: EntityId = EntityId {
    entity_key: [0x00, 0x01, 0x00],
    entity_kind: EntityKind::BUILTIN_WRITER_WITH_KEY,
  };
  pub const SPDP_BUILTIN_PARTICIPANT_READER: EntityId = EntityId {
    entity_key: [0x00, 0x01, 0x00],
    entity_kind: EntityKind::BUILTIN_READER_WITH_KEY,
  };

  /// EntityId of the n:th user-defined writer of a participant.
  pub fn new_user_writer(key: u32, topic_has_key: bool) -> EntityId {
    EntityId {
      entity_key: key_bytes(key),
      entity_kind: if topic_has_key {
        EntityKind::USER_DEFINED_WRITER_WITH_KEY
      } else {
        EntityKind::USER_DEFINED_WRITER_NO_KEY
      },
    }
  }

  /// EntityId of the n:th user-defined reader of a participant.
  pub fn new_user_reader(key: u32, topic_has_key: bool) -> EntityId {
    EntityId {
      entity_key: key_bytes(key),
      entity_kind: if topic_has_key {
        EntityKind::USER_DEFINED_READER_WITH_KEY
      } else {
        EntityKind::USER_DEFINED_READER_NO_KEY
      },
    }
  }
}

fn key_bytes(key: u32) -> [u8; 3] {
  let b = key.to_be_bytes();
  [b[1], b[2], b[3]]
}

impl Default for EntityId {
  fn default() -> EntityId {
    EntityId::UNKNOWN
  }
}

impl<'a, C: Context> Readable<'a, C> for EntityId {
  #[inline]
  fn read_from<R: Reader<'a, C>>(reader: &mut R) -> Result<Self, C::Error> {
    let mut entity_key = [0u8; 3];
    reader.read_bytes(&mut entity_key)?;
    let entity_kind: EntityKind = reader.read_value()?;
    Ok(EntityId {
      entity_key,
      entity_kind,
    })
  }

  #[inline]
  fn minimum_bytes_needed() -> usize {
    4
  }
}

impl<C: Context> Writable<C> for EntityId {
  #[inline]
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    writer.write_bytes(&self.entity_key)?;
    writer.write_value(&self.entity_kind)
  }
}

/// Globally unique identifier of an Entity: participant prefix plus
/// participant-scoped entity id.
#[derive(Copy, Clone, Debug, Default, PartialOrd, PartialEq, Ord, Eq, Hash, Readable, Writable)]
pub struct Guid {
  pub prefix: GuidPrefix,
  pub entity_id: EntityId,
}

impl Guid {
  pub const UNKNOWN: Guid = Guid {
    prefix: GuidPrefix::UNKNOWN,
    entity_id: EntityId::UNKNOWN,
  };

  pub fn new(prefix: GuidPrefix, entity_id: EntityId) -> Self {
    Self { prefix, entity_id }
  }

  pub fn from_prefix(self, entity_id: EntityId) -> Self {
    Self {
      prefix: self.prefix,
      entity_id,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn entity_kind_classification() {
    assert!(EntityKind::BUILTIN_WRITER_WITH_KEY.is_builtin());
    assert!(EntityKind::BUILTIN_WRITER_WITH_KEY.is_writer());
    assert!(!EntityKind::BUILTIN_WRITER_WITH_KEY.is_reader());
    assert!(EntityKind::USER_DEFINED_READER_NO_KEY.is_reader());
    assert!(!EntityKind::USER_DEFINED_READER_NO_KEY.is_builtin());
  }

  #[test]
  fn user_entity_key_is_big_endian() {
    let eid = EntityId::new_user_writer(0x000102, true);
    assert_eq!(eid.entity_key, [0x00, 0x01, 0x02]);
    assert_eq!(eid.entity_kind, EntityKind::USER_DEFINED_WRITER_WITH_KEY);
  }

  serialization_test!( type = GuidPrefix,
  {
      guid_prefix_unknown,
      GuidPrefix::UNKNOWN,
      le = [0x00; 12],
      be = [0x00; 12]
  },
  {
      guid_prefix_endianness_insensitive,
      GuidPrefix::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55,
                       0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB]),
      le = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55,
            0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB],
      be = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55,
            0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB]
  });

  serialization_test!( type = EntityId,
  {
      entity_unknown,
      EntityId::UNKNOWN,
      le = [0x00, 0x00, 0x00, 0x00],
      be = [0x00, 0x00, 0x00, 0x00]
  },
  {
      entity_participant,
      EntityId::PARTICIPANT,
      le = [0x00, 0x00, 0x01, 0xC1],
      be = [0x00, 0x00, 0x01, 0xC1]
  },
  {
      entity_sedp_builtin_publications_writer,
      EntityId::SEDP_BUILTIN_PUBLICATIONS_WRITER,
      le = [0x00, 0x00, 0x03, 0xC2],
      be = [0x00, 0x00, 0x03, 0xC2]
  },
  {
      entity_spdp_builtin_participant_writer,
      EntityId::SPDP_BUILTIN_PARTICIPANT_WRITER,
      le = [0x00, 0x01, 0x00, 0xC2],
      be = [0x00, 0x01, 0x00, 0xC2]
  });

  serialization_test!( type = Guid,
  {
      guid_unknown,
      Guid::UNKNOWN,
      le = [0x00; 16],
      be = [0x00; 16]
  },
  {
      guid_entity_id_on_the_last_position,
      Guid {
          prefix: GuidPrefix::UNKNOWN,
          entity_id: EntityId::PARTICIPANT,
      },
      le = [0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x01, 0xC1],
      be = [0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x01, 0xC1]
  });
}
