//! Child check-in orchestration service.
//!
//! A guardian scans the facility's shared QR code; for each linked child the
//! service validates the code window, suppresses rapid repeat scans, applies
//! the attendance state transition, and fans the committed event out to the
//! notification feed, live subscribers, and the guardian's phone.

pub mod cache;
pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod http;
pub mod model;
pub mod notify;
pub mod qr;
