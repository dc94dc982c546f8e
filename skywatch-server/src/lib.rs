//! Skywatch Server
//!
//! Native service around [`skywatch_core`]: polls the drone position feed
//! on a fixed interval, drives pilot lookups for new violators, ages out
//! stale records, and serves the violator set to polling clients over a
//! cursor-based REST endpoint.

use thiserror::Error;

pub mod feed;
pub mod pilots;
pub mod poll;
pub mod shared;
pub mod web;

/// Fatal subsystem errors; everything recoverable is logged and retried
/// on the next poll cycle instead.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine configuration: {0}")]
    Config(#[from] skywatch_core::ConfigError),
}
