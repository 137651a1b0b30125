//! Protocol value types shared by the codec, the endpoints and discovery.

pub mod builtin_endpoint;
pub mod cache_change;
pub mod count;
pub mod duration;
pub mod guid;
pub mod history_cache;
pub mod locator;
pub mod parameter_id;
pub mod reliability_kind;
pub mod sequence_number;
pub mod time;
pub mod topic_data;
pub mod topic_kind;
