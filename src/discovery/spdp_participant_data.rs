use bytes::Bytes;
#[allow(unused_imports)]
use log::{debug, trace, warn};
use speedy::{Endianness, Readable, Writable};

use crate::error::MessageError;
use crate::messages::protocol_version::ProtocolVersion;
use crate::messages::vendor_id::VendorId;
use crate::serialization::parameter::Parameter;
use crate::serialization::parameter_list::ParameterList;
use crate::serialization::representation_identifier::RepresentationIdentifier;
use crate::structure::builtin_endpoint::BuiltinEndpointSet;
use crate::structure::duration::Duration;
use crate::structure::guid::{EntityId, Guid, GuidPrefix};
use crate::structure::locator::Locator;
use crate::structure::parameter_id::ParameterId;

/// Everything a participant announces about itself over SPDP, and what
/// is stored in the remote-participant table for each discovered peer.
///
/// The advertised lease duration is recorded but not enforced: remote
/// entries leave the table only on explicit disposal, never by expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantProxyData {
  pub protocol_version: ProtocolVersion,
  pub vendor_id: VendorId,
  pub guid_prefix: GuidPrefix,
  pub metatraffic_unicast_locators: Vec<Locator>,
  pub metatraffic_multicast_locators: Vec<Locator>,
  pub default_unicast_locators: Vec<Locator>,
  pub builtin_endpoints: BuiltinEndpointSet,
  pub lease_duration: Duration,
}

const ENCAPSULATION_HEADER_SIZE: usize = 4; // scheme + options

impl ParticipantProxyData {
  /// First usable locator for metatraffic towards this participant.
  pub fn metatraffic_locator(&self) -> Option<Locator> {
    self
      .metatraffic_unicast_locators
      .iter()
      .find(|l| l.is_valid())
      .copied()
  }

  /// First usable locator for user traffic towards this participant.
  pub fn default_locator(&self) -> Option<Locator> {
    self
      .default_unicast_locators
      .iter()
      .find(|l| l.is_valid())
      .copied()
  }

  /// PL_CDR_LE encapsulated announcement payload.
  pub fn to_pl_cdr_bytes(&self) -> Bytes {
    let endianness = Endianness::LittleEndian;
    let mut list = ParameterList::new();

    let mut push = |pid, value: Result<Vec<u8>, speedy::Error>| match value {
      Ok(value) => list.push(Parameter::new(pid, value)),
      Err(e) => warn!("SPDP parameter serialization failed: {e}"),
    };

    push(
      ParameterId::PID_PROTOCOL_VERSION,
      self.protocol_version.write_to_vec_with_ctx(endianness),
    );
    push(
      ParameterId::PID_VENDOR_ID,
      self.vendor_id.write_to_vec_with_ctx(endianness),
    );
    for locator in &self.default_unicast_locators {
      push(
        ParameterId::PID_DEFAULT_UNICAST_LOCATOR,
        locator.write_to_vec_with_ctx(endianness),
      );
    }
    for locator in &self.metatraffic_unicast_locators {
      push(
        ParameterId::PID_METATRAFFIC_UNICAST_LOCATOR,
        locator.write_to_vec_with_ctx(endianness),
      );
    }
    for locator in &self.metatraffic_multicast_locators {
      push(
        ParameterId::PID_METATRAFFIC_MULTICAST_LOCATOR,
        locator.write_to_vec_with_ctx(endianness),
      );
    }
    push(
      ParameterId::PID_PARTICIPANT_LEASE_DURATION,
      self.lease_duration.write_to_vec_with_ctx(endianness),
    );
    push(
      ParameterId::PID_PARTICIPANT_GUID,
      Guid::new(self.guid_prefix, EntityId::PARTICIPANT).write_to_vec_with_ctx(endianness),
    );
    push(
      ParameterId::PID_BUILTIN_ENDPOINT_SET,
      self.builtin_endpoints.write_to_vec_with_ctx(endianness),
    );

    let mut buffer = RepresentationIdentifier::PL_CDR_LE
      .write_to_vec_with_ctx(endianness)
      .unwrap_or_default();
    buffer.extend_from_slice(&[0x00, 0x00]); // options
    match list.write_to_vec_with_ctx(endianness) {
      Ok(bytes) => buffer.extend_from_slice(&bytes),
      Err(e) => warn!("SPDP parameter list serialization failed: {e}"),
    }
    Bytes::from(buffer)
  }

  /// Decodes an announcement. Unknown parameters are skipped; a missing
  /// participant GUID makes the announcement unusable.
  pub fn from_pl_cdr_bytes(buffer: &[u8]) -> Result<ParticipantProxyData, MessageError> {
    if buffer.len() < ENCAPSULATION_HEADER_SIZE {
      return Err(MessageError::malformed("payload shorter than encapsulation"));
    }
    let scheme =
      RepresentationIdentifier::read_from_buffer_with_ctx(Endianness::LittleEndian, &buffer[..2])
        .map_err(|e| MessageError::malformed(format!("encapsulation: {e}")))?;
    if !scheme.is_parameter_list() {
      return Err(MessageError::malformed("not a PL_CDR payload"));
    }
    let endianness = scheme.endianness();
    let (list, _consumed) =
      ParameterList::read_from_bytes(&buffer[ENCAPSULATION_HEADER_SIZE..], endianness)?;

    let read_locators = |pid| -> Vec<Locator> {
      list
        .find_all(pid)
        .filter_map(|p| {
          Locator::read_from_buffer_with_ctx(endianness, &p.value)
            .map_err(|e| trace!("bad locator parameter: {e}"))
            .ok()
        })
        .collect()
    };

    let guid_prefix = list
      .find(ParameterId::PID_PARTICIPANT_GUID)
      .and_then(|p| Guid::read_from_buffer_with_ctx(endianness, &p.value).ok())
      .map(|guid| guid.prefix)
      .ok_or_else(|| MessageError::malformed("SPDP announcement without participant GUID"))?;

    let protocol_version = list
      .find(ParameterId::PID_PROTOCOL_VERSION)
      .and_then(|p| ProtocolVersion::read_from_buffer_with_ctx(endianness, &p.value).ok())
      .unwrap_or(ProtocolVersion::THIS_IMPLEMENTATION);
    let vendor_id = list
      .find(ParameterId::PID_VENDOR_ID)
      .and_then(|p| VendorId::read_from_buffer_with_ctx(endianness, &p.value).ok())
      .unwrap_or(VendorId::VENDOR_UNKNOWN);
    let builtin_endpoints = list
      .find(ParameterId::PID_BUILTIN_ENDPOINT_SET)
      .and_then(|p| BuiltinEndpointSet::read_from_buffer_with_ctx(endianness, &p.value).ok())
      .unwrap_or(BuiltinEndpointSet::from_u32(0));
    let lease_duration = list
      .find(ParameterId::PID_PARTICIPANT_LEASE_DURATION)
      .and_then(|p| Duration::read_from_buffer_with_ctx(endianness, &p.value).ok())
      .unwrap_or(Duration {
        seconds: 100,
        fraction: 0,
      });

    Ok(ParticipantProxyData {
      protocol_version,
      vendor_id,
      guid_prefix,
      metatraffic_unicast_locators: read_locators(ParameterId::PID_METATRAFFIC_UNICAST_LOCATOR),
      metatraffic_multicast_locators: read_locators(ParameterId::PID_METATRAFFIC_MULTICAST_LOCATOR),
      default_unicast_locators: read_locators(ParameterId::PID_DEFAULT_UNICAST_LOCATOR),
      builtin_endpoints,
      lease_duration,
    })
  }
}

#[cfg(test)]
mod tests {
  use std::net::Ipv4Addr;

  use super::*;

  fn sample() -> ParticipantProxyData {
    ParticipantProxyData {
      protocol_version: ProtocolVersion::THIS_IMPLEMENTATION,
      vendor_id: VendorId::THIS_IMPLEMENTATION,
      guid_prefix: GuidPrefix::new([0xAB; 12]),
      metatraffic_unicast_locators: vec![Locator::udpv4(Ipv4Addr::new(192, 168, 0, 7), 7410)],
      metatraffic_multicast_locators: vec![Locator::udpv4(Ipv4Addr::new(239, 255, 0, 1), 7400)],
      default_unicast_locators: vec![Locator::udpv4(Ipv4Addr::new(192, 168, 0, 7), 7411)],
      builtin_endpoints: BuiltinEndpointSet::ALL_SUPPORTED,
      lease_duration: Duration {
        seconds: 100,
        fraction: 0,
      },
    }
  }

  #[test]
  fn announcement_round_trip() {
    let data = sample();
    let bytes = data.to_pl_cdr_bytes();
    let decoded = ParticipantProxyData::from_pl_cdr_bytes(&bytes).unwrap();
    assert_eq!(decoded, data);
  }

  #[test]
  fn payload_opens_with_pl_cdr_le_scheme() {
    let bytes = sample().to_pl_cdr_bytes();
    assert_eq!(&bytes[..4], &[0x00, 0x03, 0x00, 0x00]);
  }

  #[test]
  fn unknown_parameters_are_skipped() {
    let mut bytes = sample().to_pl_cdr_bytes().to_vec();
    // splice an unknown parameter right after the encapsulation header
    let unknown = [0x99u8, 0x09, 0x04, 0x00, 0x01, 0x02, 0x03, 0x04];
    let mut spliced = bytes[..4].to_vec();
    spliced.extend_from_slice(&unknown);
    spliced.extend_from_slice(&bytes[4..]);
    bytes = spliced;

    let decoded = ParticipantProxyData::from_pl_cdr_bytes(&bytes).unwrap();
    assert_eq!(decoded, sample());
  }

  #[test]
  fn missing_participant_guid_is_an_error() {
    // encapsulation + bare sentinel
    let bytes = [0x00, 0x03, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00];
    assert!(ParticipantProxyData::from_pl_cdr_bytes(&bytes).is_err());
  }

  #[test]
  fn locator_selection_prefers_valid_entries() {
    let mut data = sample();
    data.metatraffic_unicast_locators.insert(0, Locator::INVALID);
    assert_eq!(
      data.metatraffic_locator(),
      Some(Locator::udpv4(Ipv4Addr::new(192, 168, 0, 7), 7410))
    );
  }
}
