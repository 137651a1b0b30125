//! Protocol behavior: the four endpoint kinds, their per-peer proxy
//! state, and the inbound submessage interpreter.

pub mod message_receiver;
pub mod reader;
pub mod reader_proxy;
pub mod stateful_writer;
pub mod stateless_writer;
pub mod writer_proxy;
