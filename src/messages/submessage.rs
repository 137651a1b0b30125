use enumflags2::BitFlags;
use speedy::{Context, Writable, Writer};

use crate::messages::ack_nack::AckNack;
use crate::messages::data::Data;
use crate::messages::heartbeat::Heartbeat;
use crate::messages::info_destination::InfoDestination;
use crate::messages::info_timestamp::InfoTimestamp;
use crate::messages::submessage_flag::*;
use crate::messages::submessage_header::SubmessageHeader;

/// One parsed submessage: its header plus the interpreted body.
#[derive(Debug, PartialEq, Clone)]
pub struct Submessage {
  pub header: SubmessageHeader,
  pub body: SubmessageBody,
}

#[derive(Debug, PartialEq, Clone)]
pub enum SubmessageBody {
  /// Addressed to an endpoint: DATA, HEARTBEAT, ACKNACK.
  Entity(EntitySubmessage),
  /// Modifies the interpretation of subsequent submessages.
  Interpreter(InterpreterSubmessage),
}

#[derive(Debug, PartialEq, Clone)]
pub enum EntitySubmessage {
  Data(Data, BitFlags<DATA_Flags>),
  Heartbeat(Heartbeat, BitFlags<HEARTBEAT_Flags>),
  AckNack(AckNack, BitFlags<ACKNACK_Flags>),
}

#[derive(Debug, PartialEq, Clone)]
pub enum InterpreterSubmessage {
  InfoTimestamp(InfoTimestamp, BitFlags<INFOTIMESTAMP_Flags>),
  InfoDestination(InfoDestination, BitFlags<INFODESTINATION_Flags>),
}

// Manual impls: the flags live in the already-written submessage
// header, so the body serializes without any enum tag.
impl<C: Context> Writable<C> for EntitySubmessage {
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    match self {
      EntitySubmessage::Data(s, _) => writer.write_value(s),
      EntitySubmessage::Heartbeat(s, _) => writer.write_value(s),
      EntitySubmessage::AckNack(s, _) => writer.write_value(s),
    }
  }
}

impl<C: Context> Writable<C> for InterpreterSubmessage {
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    match self {
      InterpreterSubmessage::InfoTimestamp(s, _) => match &s.timestamp {
        Some(ts) => writer.write_value(ts),
        None => Ok(()), // INVALIDATE: no payload
      },
      InterpreterSubmessage::InfoDestination(s, _) => writer.write_value(s),
    }
  }
}

impl<C: Context> Writable<C> for Submessage {
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    writer.write_value(&self.header)?;
    match &self.body {
      SubmessageBody::Entity(e) => writer.write_value(e),
      SubmessageBody::Interpreter(i) => writer.write_value(i),
    }
  }
}
