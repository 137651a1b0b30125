//! The dispatcher: two bounded queues and the worker threads draining
//! them. Reader threads parse and route inbound packets, writer threads
//! drive outbound progress on endpoints.
//!
//! The queues carry no owning references to endpoints: outbound work is
//! addressed by `EntityId` and resolved against the participant's
//! registry by the worker thread, so the pool can never keep an
//! endpoint alive past participant teardown.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
#[allow(unused_imports)]
use log::{debug, error, trace, warn};

use crate::network::transport::PacketInfo;
use crate::structure::guid::EntityId;

enum IncomingItem {
  Packet(PacketInfo),
  Stop,
}

enum OutgoingItem {
  Progress(EntityId),
  Stop,
}

/// What the worker threads call back into. Implemented by the
/// participant, which owns the endpoint registries.
pub trait Dispatcher: Send + Sync {
  /// Parse one packet and route its submessages. Runs on a reader
  /// thread; all errors are absorbed here.
  fn handle_packet(&self, packet: PacketInfo);

  /// Call `progress()` on the writer with this id, if it still exists.
  /// Runs on a writer thread.
  fn progress_writer(&self, writer_id: EntityId);
}

/// Inbound half: transports push received packets here.
#[derive(Clone)]
pub struct PacketSink {
  sender: Sender<IncomingItem>,
}

impl PacketSink {
  /// Hands one packet to the dispatcher. Returns `false` when the
  /// incoming queue is full or the pool has stopped; the packet is then
  /// dropped, which a lossy transport must tolerate anyway.
  pub fn deliver(&self, packet: PacketInfo) -> bool {
    match self.sender.try_send(IncomingItem::Packet(packet)) {
      Ok(()) => true,
      Err(TrySendError::Full(_)) => {
        debug!("incoming queue full, dropping packet");
        false
      }
      Err(TrySendError::Disconnected(_)) => false,
    }
  }
}

/// Outbound half: writers enqueue themselves here when they have
/// unsent changes or heartbeats due.
#[derive(Clone)]
pub struct WorkQueue {
  sender: Sender<OutgoingItem>,
}

impl WorkQueue {
  /// Returns `false` when the queue is full; the writer is then retried
  /// on its next resend or heartbeat tick.
  pub fn enqueue(&self, writer_id: EntityId) -> bool {
    match self.sender.try_send(OutgoingItem::Progress(writer_id)) {
      Ok(()) => true,
      Err(TrySendError::Full(_)) => {
        debug!("outgoing queue full, deferring writer {writer_id:?}");
        false
      }
      Err(TrySendError::Disconnected(_)) => false,
    }
  }
}

pub struct ThreadPool {
  incoming_tx: Sender<IncomingItem>,
  incoming_rx: Receiver<IncomingItem>,
  outgoing_tx: Sender<OutgoingItem>,
  outgoing_rx: Receiver<OutgoingItem>,
  threads: Mutex<Vec<JoinHandle<()>>>,
  running: AtomicBool,
  reader_threads: AtomicUsize,
  writer_threads: AtomicUsize,
}

impl ThreadPool {
  pub fn new(incoming_depth: usize, outgoing_depth: usize) -> ThreadPool {
    let (incoming_tx, incoming_rx) = bounded(incoming_depth);
    let (outgoing_tx, outgoing_rx) = bounded(outgoing_depth);
    ThreadPool {
      incoming_tx,
      incoming_rx,
      outgoing_tx,
      outgoing_rx,
      threads: Mutex::new(Vec::new()),
      running: AtomicBool::new(false),
      reader_threads: AtomicUsize::new(0),
      writer_threads: AtomicUsize::new(0),
    }
  }

  pub fn packet_sink(&self) -> PacketSink {
    PacketSink {
      sender: self.incoming_tx.clone(),
    }
  }

  pub fn work_queue(&self) -> WorkQueue {
    WorkQueue {
      sender: self.outgoing_tx.clone(),
    }
  }

  pub fn start(&self, dispatcher: Arc<dyn Dispatcher>, reader_threads: usize, writer_threads: usize) {
    if self.running.swap(true, Ordering::SeqCst) {
      return;
    }
    self.reader_threads.store(reader_threads, Ordering::SeqCst);
    self.writer_threads.store(writer_threads, Ordering::SeqCst);
    let mut threads = self.threads.lock().unwrap_or_else(|e| e.into_inner());
    for n in 0..reader_threads {
      let rx = self.incoming_rx.clone();
      let dispatcher = Arc::clone(&dispatcher);
      threads.push(
        thread::Builder::new()
          .name(format!("rtps-reader-{n}"))
          .spawn(move || reader_thread(rx, dispatcher))
          .expect("spawning reader thread"),
      );
    }
    for n in 0..writer_threads {
      let rx = self.outgoing_rx.clone();
      let dispatcher = Arc::clone(&dispatcher);
      threads.push(
        thread::Builder::new()
          .name(format!("rtps-writer-{n}"))
          .spawn(move || writer_thread(rx, dispatcher))
          .expect("spawning writer thread"),
      );
    }
  }

  /// Unblocks and joins every worker. Safe to call more than once.
  pub fn stop(&self) {
    if !self.running.swap(false, Ordering::SeqCst) {
      return;
    }
    for _ in 0..self.reader_threads.load(Ordering::SeqCst) {
      let _ = self.incoming_tx.send(IncomingItem::Stop);
    }
    for _ in 0..self.writer_threads.load(Ordering::SeqCst) {
      let _ = self.outgoing_tx.send(OutgoingItem::Stop);
    }
    let threads = std::mem::take(&mut *self.threads.lock().unwrap_or_else(|e| e.into_inner()));
    for handle in threads {
      if handle.join().is_err() {
        error!("worker thread panicked");
      }
    }
  }
}

fn reader_thread(rx: Receiver<IncomingItem>, dispatcher: Arc<dyn Dispatcher>) {
  loop {
    match rx.recv() {
      Ok(IncomingItem::Packet(packet)) => dispatcher.handle_packet(packet),
      Ok(IncomingItem::Stop) | Err(_) => break,
    }
  }
  trace!("reader thread exiting");
}

fn writer_thread(rx: Receiver<OutgoingItem>, dispatcher: Arc<dyn Dispatcher>) {
  loop {
    match rx.recv() {
      Ok(OutgoingItem::Progress(writer_id)) => dispatcher.progress_writer(writer_id),
      Ok(OutgoingItem::Stop) | Err(_) => break,
    }
  }
  trace!("writer thread exiting");
}
