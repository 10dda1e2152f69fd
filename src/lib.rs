//! SupaSidebar license server.
//!
//! This library provides the core functionality for the SupaSidebar licensing
//! backend: the license/device state machine, keyed rate limiting, license key
//! and device ID generation, and the public API handlers.

pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod keygen;
pub mod models;
pub mod rate_limit;
pub mod util;
