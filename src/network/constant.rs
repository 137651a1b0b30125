//! The standard RTPS UDP port mapping.

use std::net::Ipv4Addr;

const PB: u16 = 7400;
const DG: u16 = 250;
const PG: u16 = 2;

const D0: u16 = 0;
const D1: u16 = 10;
const D3: u16 = 11;

/// Well-known discovery multicast group.
pub const DEFAULT_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 0, 1);

/// Port of the SPDP multicast announcements of a domain.
pub fn spdp_multicast_port(domain_id: u16) -> u16 {
  PB + DG * domain_id + D0
}

/// Unicast port for metatraffic (discovery) of one participant.
pub fn builtin_unicast_port(domain_id: u16, participant_id: u16) -> u16 {
  PB + DG * domain_id + D1 + PG * participant_id
}

/// Unicast port for user traffic of one participant.
pub fn user_unicast_port(domain_id: u16, participant_id: u16) -> u16 {
  PB + DG * domain_id + D3 + PG * participant_id
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn domain_zero_participant_zero() {
    assert_eq!(spdp_multicast_port(0), 7400);
    assert_eq!(builtin_unicast_port(0, 0), 7410);
    assert_eq!(user_unicast_port(0, 0), 7411);
  }

  #[test]
  fn ports_scale_with_domain_and_participant() {
    assert_eq!(spdp_multicast_port(1), 7650);
    assert_eq!(builtin_unicast_port(1, 2), 7664);
    assert_eq!(user_unicast_port(1, 2), 7665);
  }
}
