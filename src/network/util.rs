use std::net::{IpAddr, Ipv4Addr};

#[allow(unused_imports)]
use log::{debug, error, trace};

use crate::network::constant::DEFAULT_MULTICAST_GROUP;
use crate::structure::locator::Locator;

pub fn local_multicast_locator(port: u16) -> Locator {
  Locator::udpv4(DEFAULT_MULTICAST_GROUP, port)
}

/// One locator per non-loopback IPv4 interface, falling back to
/// loopback when none exist (single-host test setups).
pub fn local_unicast_locators(port: u16) -> Vec<Locator> {
  let mut locators: Vec<Locator> = match if_addrs::get_if_addrs() {
    Ok(ifaces) => ifaces
      .iter()
      .filter(|iface| !iface.is_loopback())
      .filter_map(|iface| match iface.ip() {
        IpAddr::V4(ip) => Some(Locator::udpv4(ip, port)),
        IpAddr::V6(_) => None, // UDPv6 is out of scope
      })
      .collect(),
    Err(e) => {
      error!("cannot enumerate local network interfaces: {e:?}");
      Vec::new()
    }
  };
  if locators.is_empty() {
    locators.push(Locator::udpv4(Ipv4Addr::LOCALHOST, port));
  }
  locators
}
