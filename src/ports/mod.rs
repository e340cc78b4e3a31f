//! Port traits between the domain and its adapters.

pub mod config_port;
pub mod journal_port;
pub mod market_data_port;
