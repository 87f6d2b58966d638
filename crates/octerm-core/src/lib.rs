//! Core octerm library (config, catalog client, event feed, reconciliation, sessions).

pub mod client;
pub mod config;
pub mod feed;
pub mod interrupt;
pub mod logging;
pub mod session;
pub mod stream;
