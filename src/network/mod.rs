//! Transport abstraction and the RTPS UDP port mapping.

pub mod constant;
pub mod transport;
pub mod udp_transport;
pub mod util;
