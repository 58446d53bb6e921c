//! Shared application state threaded through every axum handler, grounded
//! in `ferrex-server`'s `AppState` (one struct of `Arc`-wrapped services
//! cloned per request).

use pulse_core::config::{ChannelNames, PulseConfig};
use pulse_core::store::KvStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn KvStore>,
    pub channels: ChannelNames,
    pub ws_push_interval_secs: u64,
}

impl AppState {
    pub fn new(store: Arc<dyn KvStore>, config: &PulseConfig) -> Self {
        Self {
            store,
            channels: config.channels.clone(),
            ws_push_interval_secs: config.serve.ws_push_interval_secs,
        }
    }
}
