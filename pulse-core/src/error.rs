use thiserror::Error;

/// Errors surfaced by the store, coordination fabric, and domain layer.
///
/// Follows the taxonomy in spec §7: `Config`/`Connect` are fatal at startup,
/// everything else is meant to be logged and handled by the caller within a
/// pass (the hot loops never propagate a `PulseError` out to a panic).
#[derive(Error, Debug)]
pub enum PulseError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("store connection error: {0}")]
    Connect(String),

    #[error("store error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("sentiment oracle error: {0}")]
    Oracle(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, PulseError>;
