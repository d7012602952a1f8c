//! chantube library crate.
//!
//! Keeps local folders in step with a list of remote channels: new uploads
//! are downloaded inside a lookback window, old ones are retired after a
//! retention period and media servers are asked to rescan when anything
//! changed.

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod filter;
pub mod logging;
pub mod media;
pub mod notification;
pub mod registry;
pub mod retention;
pub mod scheduler;
pub mod sync;
pub mod utils;

pub use error::{Error, Result};
