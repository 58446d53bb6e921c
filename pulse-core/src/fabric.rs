//! Coordination fabric: the pub/sub layer stage binaries use to notify each
//! other of completed passes (spec §5 / §6.2).
//!
//! Grounded in `ferrex-server/src/infra/scan/media_event_bus.rs`'s
//! `MediaEventBus` (broadcast channel + bounded history) for the in-memory
//! test backing, and in `cleaner.py`'s pubsub listen loop — `pubsub.get_message
//! (timeout=1.0)` in a loop checking a shutdown flag — for the bounded-wait
//! contract every implementation must honor.

use crate::error::{PulseError, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::broadcast;

/// A completion notification published on a channel, matching spec §6.2's
/// envelope shape: an event name, an ISO timestamp, and whatever summary
/// statistics the publishing stage wants to attach (items processed,
/// duplicates skipped, etc).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub event: String,
    pub timestamp: String,
    #[serde(default)]
    pub statistics: HashMap<String, Value>,
}

impl Notification {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            timestamp: crate::time::to_iso_seconds(Utc::now()),
            statistics: HashMap::new(),
        }
    }

    pub fn with_stat(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.statistics.insert(key.into(), value.into());
        self
    }
}

/// Outcome of a bounded wait: either a notification arrived, or the wait
/// timed out with nothing to report (the caller loops and checks its
/// shutdown flag, same as `cleaner.py::run_event_driven`).
#[derive(Debug, Clone)]
pub enum WaitOutcome {
    Notified(Notification),
    TimedOut,
}

#[async_trait]
pub trait Fabric: Send + Sync {
    async fn publish(&self, channel: &str, notification: Notification) -> Result<()>;

    /// A receiver bound to `channel`; `wait_or_poll` is called against it
    /// repeatedly until a notification arrives or the caller's shutdown flag
    /// trips.
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>>;
}

#[async_trait]
pub trait Subscription: Send {
    /// Waits up to `timeout` for the next notification on this
    /// subscription. Returns `TimedOut` rather than blocking indefinitely so
    /// callers can re-check a shutdown flag on a steady cadence.
    async fn wait_or_poll(&mut self, timeout: Duration) -> Result<WaitOutcome>;
}

/// Redis-backed fabric. Each subscription opens its own dedicated pub/sub
/// connection (Redis pub/sub connections can't share a multiplexed
/// `ConnectionManager` the way ordinary commands do).
pub struct RedisFabric {
    client: redis::Client,
}

impl RedisFabric {
    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| PulseError::Connect(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fabric for RedisFabric {
    async fn publish(&self, channel: &str, notification: Notification) -> Result<()> {
        let payload = serde_json::to_string(&notification)?;
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| PulseError::Connect(e.to_string()))?;
        let _: () = redis::AsyncCommands::publish(&mut conn, channel, payload).await?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>> {
        let pubsub_conn = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| PulseError::Connect(e.to_string()))?;
        let mut pubsub_conn = pubsub_conn;
        pubsub_conn
            .subscribe(channel)
            .await
            .map_err(|e| PulseError::Connect(e.to_string()))?;
        Ok(Box::new(RedisSubscription { pubsub_conn }))
    }
}

struct RedisSubscription {
    pubsub_conn: redis::aio::PubSub,
}

#[async_trait]
impl Subscription for RedisSubscription {
    async fn wait_or_poll(&mut self, timeout: Duration) -> Result<WaitOutcome> {
        use futures_util::StreamExt;
        let mut stream = self.pubsub_conn.on_message();
        match tokio::time::timeout(timeout, stream.next()).await {
            Ok(Some(msg)) => {
                let payload: String = msg.get_payload().map_err(PulseError::Store)?;
                match serde_json::from_str(&payload) {
                    Ok(notification) => Ok(WaitOutcome::Notified(notification)),
                    Err(e) => {
                        tracing::warn!("skipping malformed notification payload: {e}");
                        Ok(WaitOutcome::TimedOut)
                    }
                }
            }
            Ok(None) => Ok(WaitOutcome::TimedOut),
            Err(_elapsed) => Ok(WaitOutcome::TimedOut),
        }
    }
}

/// In-process fabric for tests, grounded in `MediaEventBus`'s
/// broadcast-channel-per-topic approach, simplified to one channel name per
/// `InMemoryFabric` since tests never need more than one topic live at once.
pub struct InMemoryFabric {
    sender: broadcast::Sender<(String, Notification)>,
}

impl InMemoryFabric {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }
}

impl Default for InMemoryFabric {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fabric for InMemoryFabric {
    async fn publish(&self, channel: &str, notification: Notification) -> Result<()> {
        let _ = self.sender.send((channel.to_string(), notification));
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>> {
        Ok(Box::new(InMemorySubscription {
            channel: channel.to_string(),
            receiver: self.sender.subscribe(),
        }))
    }
}

struct InMemorySubscription {
    channel: String,
    receiver: broadcast::Receiver<(String, Notification)>,
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn wait_or_poll(&mut self, timeout: Duration) -> Result<WaitOutcome> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Ok(WaitOutcome::TimedOut);
            }
            match tokio::time::timeout(remaining, self.receiver.recv()).await {
                Ok(Ok((channel, notification))) if channel == self.channel => {
                    return Ok(WaitOutcome::Notified(notification));
                }
                Ok(Ok(_)) => continue,
                Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                Ok(Err(broadcast::error::RecvError::Closed)) => return Ok(WaitOutcome::TimedOut),
                Err(_elapsed) => return Ok(WaitOutcome::TimedOut),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_then_subscribe_wait_delivers_the_notification() {
        let fabric = InMemoryFabric::new();
        let mut sub = fabric.subscribe("clean_done").await.unwrap();
        fabric
            .publish("clean_done", Notification::new("clean_done").with_stat("items", 12))
            .await
            .unwrap();
        match sub.wait_or_poll(Duration::from_millis(200)).await.unwrap() {
            WaitOutcome::Notified(n) => {
                assert_eq!(n.event, "clean_done");
                assert_eq!(n.statistics.get("items").unwrap(), 12);
            }
            WaitOutcome::TimedOut => panic!("expected a notification"),
        }
    }

    #[tokio::test]
    async fn wait_times_out_when_nothing_is_published() {
        let fabric = InMemoryFabric::new();
        let mut sub = fabric.subscribe("clean_done").await.unwrap();
        let outcome = sub.wait_or_poll(Duration::from_millis(50)).await.unwrap();
        assert!(matches!(outcome, WaitOutcome::TimedOut));
    }

    #[tokio::test]
    async fn subscription_ignores_notifications_on_other_channels() {
        let fabric = InMemoryFabric::new();
        let mut sub = fabric.subscribe("analytics_done").await.unwrap();
        fabric
            .publish("clean_done", Notification::new("clean_done"))
            .await
            .unwrap();
        let outcome = sub.wait_or_poll(Duration::from_millis(50)).await.unwrap();
        assert!(matches!(outcome, WaitOutcome::TimedOut));
    }
}
