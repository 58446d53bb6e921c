//! Shared building blocks for the Pulse pipeline's four stage binaries:
//! domain types, the `KvStore` port and its Redis/in-memory implementations,
//! the pub/sub coordination fabric, dedup, retention, config, and shutdown
//! signaling.

pub mod config;
pub mod dedup;
pub mod domain;
pub mod error;
pub mod fabric;
pub mod fingerprint;
pub mod retention;
pub mod shutdown;
pub mod store;
pub mod time;

pub use domain::{CacheMode, CacheStatus, CleanItem, RawItem};
pub use error::{PulseError, Result};
pub use fingerprint::Fingerprint;
