//! PL_CDR: the parameter-list encoding used by discovery payloads and
//! inline QoS.

pub mod parameter;
pub mod parameter_list;
pub mod representation_identifier;
