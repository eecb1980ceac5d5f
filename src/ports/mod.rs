//! Port traits the domain calls out through.

pub mod config_port;
pub mod data_port;
pub mod exchange_port;
pub mod report_port;
