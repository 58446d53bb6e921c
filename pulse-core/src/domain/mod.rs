//! Shared domain types flowing through the pipeline's four stages.

mod clean_item;
mod id_cache;
mod raw_item;

pub use clean_item::CleanItem;
pub use id_cache::{CacheMode, CacheStatus, DEFAULT_WINDOW};
pub use raw_item::RawItem;
