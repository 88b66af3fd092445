//! Port traits: the seams between the scanning engine and the outside world.

pub mod config_port;
pub mod data_port;
pub mod ledger_port;
pub mod notification_port;
