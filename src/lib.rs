//! An embedded-profile implementation of the RTPS (Real-Time
//! Publish-Subscribe) wire protocol, as used by DDS middleware, over
//! UDP/IPv4.
//!
//! The crate provides a [`DomainParticipant`] that owns a set of RTPS
//! readers and writers, discovers peer participants on the local network
//! with the SPDP/SEDP builtin protocols, and delivers opaque payload
//! bytes with either best-effort or reliable semantics.
//!
//! # Example
//!
//! ```no_run
//! use rtps_lite::{DomainParticipant, ParticipantConfig, ChangeKind,
//!                 ReliabilityKind, TopicKind};
//!
//! let participant = DomainParticipant::new(ParticipantConfig::default()).unwrap();
//! let writer = participant
//!   .create_writer("chatter", "std_msgs::msg::dds_::String_",
//!                  ReliabilityKind::BEST_EFFORT, TopicKind::NO_KEY)
//!   .unwrap();
//! participant.start().unwrap();
//! writer.new_change(ChangeKind::ALIVE, b"hello".as_slice().into()).unwrap();
//! ```
//!
//! Scope: no fragmentation (a message must fit one datagram), volatile
//! history only, no transport other than UDPv4, no security.

// Byte-exact serialization tests against known little- and big-endian
// images. Each case expands to its own module so failures name the case.
#[cfg(test)]
macro_rules! serialization_test {
  ( type = $t:ty, $({ $name:ident, $value:expr, le = $le:expr, be = $be:expr }),+ ) => {
    $(mod $name {
      use super::*;
      #[allow(unused_imports)]
      use speedy::{Endianness, Readable, Writable};

      #[test]
      fn serialize_deserialize_little_endian() {
        let value: $t = $value;
        let encoded = value.write_to_vec_with_ctx(Endianness::LittleEndian).unwrap();
        assert_eq!(
          &encoded[..], &$le[..],
          "LE serialization mismatch,\n expected: {:?},\n found:    {:?}", $le, encoded
        );
        let decoded = <$t>::read_from_buffer_with_ctx(Endianness::LittleEndian, &encoded).unwrap();
        assert_eq!(decoded, value);
      }

      #[test]
      fn serialize_deserialize_big_endian() {
        let value: $t = $value;
        let encoded = value.write_to_vec_with_ctx(Endianness::BigEndian).unwrap();
        assert_eq!(
          &encoded[..], &$be[..],
          "BE serialization mismatch,\n expected: {:?},\n found:    {:?}", $be, encoded
        );
        let decoded = <$t>::read_from_buffer_with_ctx(Endianness::BigEndian, &encoded).unwrap();
        assert_eq!(decoded, value);
      }
    })+
  };
}

pub mod config;
pub mod error;
pub mod structure;

pub mod messages;
pub mod serialization;

pub mod network;
pub mod rtps;
pub mod thread_pool;

pub mod discovery;
pub mod participant;

pub use config::ParticipantConfig;
pub use error::{ApiError, HistoryError, MessageError};
pub use participant::{DomainParticipant, Reader, Writer};
pub use rtps::reader::{SampleInfo, SampleListener};
pub use structure::{
  cache_change::ChangeKind,
  guid::{EntityId, Guid, GuidPrefix},
  locator::Locator,
  reliability_kind::ReliabilityKind,
  sequence_number::SequenceNumber,
  topic_kind::TopicKind,
};
