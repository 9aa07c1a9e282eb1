//! Auction deal detection and closing-time alerting.

pub mod agent;
pub mod config;
pub mod db;
pub mod deal;
pub mod error;
pub mod lot;
pub mod monitoring;
pub mod source;
pub mod store;
