use std::io;
use std::net::SocketAddr;

use bytes::Bytes;

use crate::structure::locator::Locator;
use crate::thread_pool::PacketSink;

/// One received datagram, tagged with where it arrived and came from.
#[derive(Debug, Clone)]
pub struct PacketInfo {
  /// Local port the datagram arrived on (metatraffic or user traffic).
  pub dest_port: u16,
  /// Sender address as seen on the socket.
  pub source: SocketAddr,
  /// The datagram.
  pub buffer: Bytes,
}

/// The capabilities the protocol engine needs from the network.
///
/// Implementations deliver inbound datagrams by handing [`PacketInfo`]s
/// to the [`PacketSink`] given to [`start`](Transport::start); a full
/// dispatcher queue drops the packet at this boundary. Outbound,
/// [`send`](Transport::send) must not block for long: endpoints call it
/// after releasing their own locks but from protocol worker threads.
pub trait Transport: Send + Sync {
  /// Opens a unicast receive port.
  fn bind_unicast(&self, port: u16) -> io::Result<()>;

  /// Joins the multicast group of the locator and receives on its port.
  fn join_multicast(&self, locator: &Locator) -> io::Result<()>;

  /// Sends one datagram towards a locator. Errors are logged, not
  /// surfaced: a lossy medium is part of the protocol's failure model.
  fn send(&self, dest: &Locator, buffer: &[u8]);

  /// Begins delivering received packets into `sink`.
  fn start(&self, sink: PacketSink) -> io::Result<()>;

  /// Stops receive threads. Must be idempotent.
  fn shutdown(&self);
}
