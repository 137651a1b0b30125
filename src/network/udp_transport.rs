use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::Bytes;
#[allow(unused_imports)]
use log::{debug, error, trace, warn};
use socket2::{Domain, Protocol, Socket, Type};

use crate::network::transport::{PacketInfo, Transport};
use crate::structure::locator::Locator;
use crate::thread_pool::PacketSink;

// Datagrams cannot exceed 64 kB; the receive buffer must hold the
// largest possible one because a UDP read truncates silently.
const RECV_BUFFER_SIZE: usize = 64 * 1024;

// Receive threads block at most this long so shutdown is prompt.
const RECV_POLL_PERIOD: Duration = Duration::from_millis(100);

/// UDP/IPv4 transport on the host network stack. One receive thread per
/// bound socket pushes datagrams into the dispatcher's packet sink.
pub struct UdpTransport {
  send_socket: UdpSocket,
  recv_sockets: Mutex<Vec<(u16, UdpSocket)>>,
  handles: Mutex<Vec<JoinHandle<()>>>,
  running: Arc<AtomicBool>,
}

impl UdpTransport {
  pub fn new() -> io::Result<UdpTransport> {
    let send_socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))?;
    Ok(UdpTransport {
      send_socket,
      recv_sockets: Mutex::new(Vec::new()),
      handles: Mutex::new(Vec::new()),
      running: Arc::new(AtomicBool::new(false)),
    })
  }

  /// SO_REUSEADDR must be set below the std socket level, before bind,
  /// so that several participants on one host can share the discovery
  /// multicast port.
  fn new_recv_socket(port: u16) -> io::Result<UdpSocket> {
    let raw_socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    raw_socket.set_reuse_address(true)?;
    let address = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    raw_socket.bind(&address.into())?;
    let socket: UdpSocket = raw_socket.into();
    socket.set_read_timeout(Some(RECV_POLL_PERIOD))?;
    Ok(socket)
  }
}

impl Transport for UdpTransport {
  fn bind_unicast(&self, port: u16) -> io::Result<()> {
    let socket = Self::new_recv_socket(port)?;
    debug!("bound unicast port {port}");
    self
      .recv_sockets
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .push((port, socket));
    Ok(())
  }

  fn join_multicast(&self, locator: &Locator) -> io::Result<()> {
    let addr = locator.to_socket_addr().ok_or_else(|| {
      io::Error::new(io::ErrorKind::InvalidInput, "not a UDPv4 locator")
    })?;
    let group = match addr.ip() {
      std::net::IpAddr::V4(ip) => ip,
      _ => return Err(io::Error::new(io::ErrorKind::InvalidInput, "IPv6 group")),
    };
    let socket = Self::new_recv_socket(addr.port())?;
    socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
    debug!("joined multicast group {group} on port {}", addr.port());
    self
      .recv_sockets
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .push((addr.port(), socket));
    Ok(())
  }

  fn send(&self, dest: &Locator, buffer: &[u8]) {
    let Some(addr) = dest.to_socket_addr() else {
      warn!("cannot send to non-UDPv4 locator {dest:?}");
      return;
    };
    if let Err(e) = self.send_socket.send_to(buffer, addr) {
      // Losing a datagram is within the protocol failure model.
      debug!("send to {addr} failed: {e}");
    }
  }

  fn start(&self, sink: PacketSink) -> io::Result<()> {
    if self.running.swap(true, Ordering::SeqCst) {
      return Ok(());
    }
    let sockets = self.recv_sockets.lock().unwrap_or_else(|e| e.into_inner());
    let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
    for (port, socket) in sockets.iter() {
      let port = *port;
      let socket = socket.try_clone()?;
      let sink = sink.clone();
      let running = Arc::clone(&self.running);
      handles.push(
        thread::Builder::new()
          .name(format!("rtps-udp-{port}"))
          .spawn(move || receive_loop(port, socket, sink, running))?,
      );
    }
    Ok(())
  }

  fn shutdown(&self) {
    if !self.running.swap(false, Ordering::SeqCst) {
      return;
    }
    let handles = std::mem::take(&mut *self.handles.lock().unwrap_or_else(|e| e.into_inner()));
    for handle in handles {
      if handle.join().is_err() {
        error!("udp receive thread panicked");
      }
    }
  }
}

fn receive_loop(port: u16, socket: UdpSocket, sink: PacketSink, running: Arc<AtomicBool>) {
  let mut buffer = vec![0u8; RECV_BUFFER_SIZE];
  while running.load(Ordering::SeqCst) {
    match socket.recv_from(&mut buffer) {
      Ok((len, source)) => {
        trace!("received {len} bytes on port {port} from {source}");
        sink.deliver(PacketInfo {
          dest_port: port,
          source,
          buffer: Bytes::copy_from_slice(&buffer[..len]),
        });
      }
      Err(e)
        if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {}
      Err(e) => {
        warn!("recv on port {port} failed: {e}");
        break;
      }
    }
  }
  trace!("receive thread for port {port} exiting");
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::thread_pool::ThreadPool;

  #[test]
  fn bind_and_send_loopback() {
    let transport = UdpTransport::new().unwrap();
    transport.bind_unicast(0).unwrap_or_else(|_| {
      // port 0 asks the OS for a free port; binding cannot clash
      panic!("bind failed")
    });

    // sending to an unroutable locator must not panic
    transport.send(&Locator::INVALID, b"dropped");
    transport.send(&Locator::udpv4(Ipv4Addr::LOCALHOST, 39999), b"fine");
  }

  #[test]
  fn shutdown_without_start_is_a_no_op() {
    let transport = UdpTransport::new().unwrap();
    transport.shutdown();
  }

  #[test]
  fn start_and_shutdown_joins_threads() {
    let transport = UdpTransport::new().unwrap();
    transport.bind_unicast(0).unwrap();
    let pool = ThreadPool::new(4, 4);
    transport.start(pool.packet_sink()).unwrap();
    transport.shutdown();
  }
}
