use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use speedy::{Context, Readable, Reader, Writable, Writer};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Readable, Writable)]
pub struct LocatorKind {
  value: i32,
}

impl LocatorKind {
  pub const INVALID: LocatorKind = LocatorKind { value: -1 };
  pub const RESERVED: LocatorKind = LocatorKind { value: 0 };
  pub const UDPV4: LocatorKind = LocatorKind { value: 1 };
  pub const UDPV6: LocatorKind = LocatorKind { value: 2 };
}

/// Names a network endpoint: transport kind, port, 16-byte address.
/// Only UDPv4 is implemented; an IPv4 address occupies the last four
/// address bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Locator {
  pub kind: LocatorKind,
  pub port: u32,
  pub address: [u8; 16],
}

impl Locator {
  pub const INVALID: Locator = Locator {
    kind: LocatorKind::INVALID,
    port: 0,
    address: [0x00; 16],
  };

  pub fn udpv4(ip: Ipv4Addr, port: u16) -> Locator {
    let o = ip.octets();
    let mut address = [0u8; 16];
    address[12..16].copy_from_slice(&o);
    Locator {
      kind: LocatorKind::UDPV4,
      port: u32::from(port),
      address,
    }
  }

  pub fn is_valid(&self) -> bool {
    self.kind == LocatorKind::UDPV4 && self.port != 0
  }

  pub fn is_multicast(&self) -> bool {
    self.kind == LocatorKind::UDPV4 && self.address[12] >= 224 && self.address[12] <= 239
  }

  pub fn to_socket_addr(&self) -> Option<SocketAddr> {
    if self.kind != LocatorKind::UDPV4 {
      return None;
    }
    let a = &self.address;
    Some(SocketAddr::new(
      IpAddr::V4(Ipv4Addr::new(a[12], a[13], a[14], a[15])),
      self.port as u16,
    ))
  }
}

impl Default for Locator {
  fn default() -> Self {
    Locator::INVALID
  }
}

impl From<SocketAddr> for Locator {
  fn from(socket_address: SocketAddr) -> Self {
    match socket_address.ip() {
      IpAddr::V4(ip4) => Locator::udpv4(ip4, socket_address.port()),
      IpAddr::V6(_) => Locator::INVALID, // UDPv6 is out of scope
    }
  }
}

impl<'a, C: Context> Readable<'a, C> for Locator {
  #[inline]
  fn read_from<R: Reader<'a, C>>(reader: &mut R) -> Result<Self, C::Error> {
    let kind: LocatorKind = reader.read_value()?;
    let port: u32 = reader.read_value()?;
    let mut address = [0u8; 16];
    reader.read_bytes(&mut address)?;
    Ok(Locator {
      kind,
      port,
      address,
    })
  }

  #[inline]
  fn minimum_bytes_needed() -> usize {
    24
  }
}

impl<C: Context> Writable<C> for Locator {
  #[inline]
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    writer.write_value(&self.kind)?;
    writer.write_u32(self.port)?;
    writer.write_bytes(&self.address)
  }
}
