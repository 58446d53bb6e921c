//! The `KvStore` port: the subset of Redis data-structure operations the
//! pipeline's four stages need, abstracted so tests can run against an
//! in-process double instead of a live Redis.
//!
//! Grounded in `ferrex-core/src/database/cache.rs`'s `RedisCache` (a thin
//! `redis::aio::ConnectionManager` wrapper exposing `get`/`set`/`delete`),
//! generalized to the list/set/sorted-set operations spec §3's queues and
//! dedup caches need, on top of the same `ConnectionManager` + `AsyncCommands`
//! pattern.

use crate::error::{PulseError, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// What kind of Redis structure a key currently holds, used by the dedup
/// cache to infer whether an existing key is a permanent set or a
/// time-windowed sorted set (spec §3: the type is a deployment fact, not
/// something the fingerprint encodes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Missing,
    Set,
    SortedSet,
    List,
    String,
    Other,
}

/// The storage port. All operations are fallible because the backing Redis
/// connection can drop mid-pass; callers in the hot loops log and skip rather
/// than propagate a panic (spec §7).
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn key_kind(&self, key: &str) -> Result<KeyKind>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    async fn lpush(&self, key: &str, value: &str) -> Result<()>;
    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>>;
    async fn llen(&self, key: &str) -> Result<u64>;
    async fn lrem(&self, key: &str, count: isize, value: &str) -> Result<u64>;
    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<()>;

    async fn sadd(&self, key: &str, member: &str) -> Result<()>;
    async fn sismember(&self, key: &str, member: &str) -> Result<bool>;
    async fn scard(&self, key: &str) -> Result<u64>;

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()>;
    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>>;
    async fn zcard(&self, key: &str) -> Result<u64>;
    async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<Vec<String>>;
    async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<u64>;

    /// All keys beginning with `prefix`, used by the read API to enumerate
    /// the per-keyword history keys a snapshot scattered under
    /// `processed_data:history_data:*`. Unordered.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Applies every rewrite (an `LREM` of the old value followed by an
    /// `LPUSH` of the new one) in a single round trip, for callers that
    /// batch up a full scan's worth of changes before flushing (spec
    /// §4.3.1's deferred sentiment write-back).
    async fn apply_list_rewrites(&self, rewrites: &[ListRewrite<'_>]) -> Result<()>;
}

/// One queue rewrite: remove `old_value` and push `new_value` in its place.
#[derive(Debug, Clone, Copy)]
pub struct ListRewrite<'a> {
    pub key: &'a str,
    pub old_value: &'a str,
    pub new_value: &'a str,
}

/// Redis-backed implementation, one `ConnectionManager` shared across all
/// callers (it multiplexes and auto-reconnects internally, same as
/// `RedisCache`).
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| PulseError::Connect(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| PulseError::Connect(e.to_string()))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn key_kind(&self, key: &str) -> Result<KeyKind> {
        let mut conn = self.conn.clone();
        let kind: String = redis::cmd("TYPE").arg(key).query_async(&mut conn).await?;
        Ok(match kind.as_str() {
            "none" => KeyKind::Missing,
            "set" => KeyKind::Set,
            "zset" => KeyKind::SortedSet,
            "list" => KeyKind::List,
            "string" => KeyKind::String,
            _ => KeyKind::Other,
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.expire(key, ttl.as_secs() as i64).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.lpush(key, value).await?;
        Ok(())
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.lrange(key, start, stop).await?)
    }

    async fn llen(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        Ok(conn.llen(key).await?)
    }

    async fn lrem(&self, key: &str, count: isize, value: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        Ok(conn.lrem(key, count, value).await?)
    }

    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.ltrim(key, start, stop).await?;
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.sadd(key, member).await?;
        Ok(())
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        Ok(conn.sismember(key, member).await?)
    }

    async fn scard(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        Ok(conn.scard(key).await?)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.zadd(key, member, score).await?;
        Ok(())
    }

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>> {
        let mut conn = self.conn.clone();
        Ok(conn.zscore(key, member).await?)
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        Ok(conn.zcard(key).await?)
    }

    async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.zrangebyscore(key, min, max).await?)
    }

    async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<u64> {
        let mut conn = self.conn.clone();
        Ok(conn.zrembyscore(key, min, max).await?)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let pattern = format!("{prefix}*");
        Ok(redis::cmd("KEYS").arg(pattern).query_async(&mut conn).await?)
    }

    async fn apply_list_rewrites(&self, rewrites: &[ListRewrite<'_>]) -> Result<()> {
        if rewrites.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        for rewrite in rewrites {
            pipe.lrem(rewrite.key, 1, rewrite.old_value).ignore();
            pipe.lpush(rewrite.key, rewrite.new_value).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
struct MemoryValue {
    string: Option<String>,
    list: VecDeque<String>,
    set: std::collections::HashSet<String>,
    zset: std::collections::HashMap<String, f64>,
}

/// In-process test double. Keyed entries never expire on their own (no
/// background reaper); `expire`/TTL bookkeeping is a no-op recorded only to
/// keep the trait contract satisfiable — tests that care about TTL behavior
/// assert directly on what was written instead.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<std::collections::HashMap<String, MemoryValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh member name for callers that need a unique placeholder
    /// (mirrors the uuid-based synthetic ids used in a couple of teacher
    /// test fixtures).
    pub fn fresh_member() -> String {
        Uuid::new_v4().to_string()
    }
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn key_kind(&self, key: &str) -> Result<KeyKind> {
        let data = self.data.lock().unwrap();
        Ok(match data.get(key) {
            None => KeyKind::Missing,
            Some(v) if v.string.is_some() => KeyKind::String,
            Some(v) if !v.zset.is_empty() => KeyKind::SortedSet,
            Some(v) if !v.set.is_empty() => KeyKind::Set,
            Some(v) if !v.list.is_empty() => KeyKind::List,
            Some(_) => KeyKind::Missing,
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.data.lock().unwrap().remove(key);
        Ok(())
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> Result<()> {
        let _ = now_secs();
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.lock().unwrap().get(key).and_then(|v| v.string.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        data.entry(key.to_string()).or_default().string = Some(value.to_string());
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, _ttl: Duration) -> Result<()> {
        self.set(key, value).await
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        data.entry(key.to_string()).or_default().list.push_front(value.to_string());
        Ok(())
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>> {
        let data = self.data.lock().unwrap();
        let Some(v) = data.get(key) else {
            return Ok(Vec::new());
        };
        let len = v.list.len() as isize;
        let (s, e) = resolve_range(start, stop, len);
        if s > e || len == 0 {
            return Ok(Vec::new());
        }
        Ok(v.list
            .iter()
            .skip(s as usize)
            .take((e - s + 1) as usize)
            .cloned()
            .collect())
    }

    async fn llen(&self, key: &str) -> Result<u64> {
        Ok(self.data.lock().unwrap().get(key).map(|v| v.list.len() as u64).unwrap_or(0))
    }

    async fn lrem(&self, key: &str, count: isize, value: &str) -> Result<u64> {
        let mut data = self.data.lock().unwrap();
        let Some(v) = data.get_mut(key) else {
            return Ok(0);
        };
        let mut removed = 0u64;
        let limit = if count == 0 { usize::MAX } else { count.unsigned_abs() };
        if count >= 0 {
            let mut kept = VecDeque::with_capacity(v.list.len());
            for item in v.list.drain(..) {
                if item == value && (removed as usize) < limit {
                    removed += 1;
                } else {
                    kept.push_back(item);
                }
            }
            v.list = kept;
        } else {
            let mut kept: VecDeque<String> = VecDeque::with_capacity(v.list.len());
            for item in v.list.drain(..).rev() {
                if item == value && (removed as usize) < limit {
                    removed += 1;
                } else {
                    kept.push_front(item);
                }
            }
            v.list = kept;
        }
        Ok(removed)
    }

    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        let Some(v) = data.get_mut(key) else {
            return Ok(());
        };
        let len = v.list.len() as isize;
        let (s, e) = resolve_range(start, stop, len);
        if s > e || len == 0 {
            v.list.clear();
            return Ok(());
        }
        v.list = v
            .list
            .iter()
            .skip(s as usize)
            .take((e - s + 1) as usize)
            .cloned()
            .collect();
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        data.entry(key.to_string()).or_default().set.insert(member.to_string());
        Ok(())
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .get(key)
            .map(|v| v.set.contains(member))
            .unwrap_or(false))
    }

    async fn scard(&self, key: &str) -> Result<u64> {
        Ok(self.data.lock().unwrap().get(key).map(|v| v.set.len() as u64).unwrap_or(0))
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        data.entry(key.to_string())
            .or_default()
            .zset
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .get(key)
            .and_then(|v| v.zset.get(member).copied()))
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        Ok(self.data.lock().unwrap().get(key).map(|v| v.zset.len() as u64).unwrap_or(0))
    }

    async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<Vec<String>> {
        let data = self.data.lock().unwrap();
        let Some(v) = data.get(key) else {
            return Ok(Vec::new());
        };
        let mut members: Vec<(&String, &f64)> =
            v.zset.iter().filter(|(_, s)| **s >= min && **s <= max).collect();
        members.sort_by(|a, b| a.1.partial_cmp(b.1).unwrap());
        Ok(members.into_iter().map(|(m, _)| m.clone()).collect())
    }

    async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<u64> {
        let mut data = self.data.lock().unwrap();
        let Some(v) = data.get_mut(key) else {
            return Ok(0);
        };
        let before = v.zset.len();
        v.zset.retain(|_, s| !(*s >= min && *s <= max));
        Ok((before - v.zset.len()) as u64)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let data = self.data.lock().unwrap();
        Ok(data.keys().filter(|k| k.starts_with(prefix)).cloned().collect())
    }

    async fn apply_list_rewrites(&self, rewrites: &[ListRewrite<'_>]) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        for rewrite in rewrites {
            let entry = data.entry(rewrite.key.to_string()).or_default();
            if let Some(pos) = entry.list.iter().position(|v| v == rewrite.old_value) {
                entry.list.remove(pos);
            }
            entry.list.push_front(rewrite.new_value.to_string());
        }
        Ok(())
    }
}

/// Redis-style negative indices resolve to `len + i`; both ends are
/// clamped into range and inclusive, matching `LRANGE`/`LTRIM` semantics.
fn resolve_range(start: isize, stop: isize, len: isize) -> (isize, isize) {
    let norm = |i: isize| -> isize {
        if i < 0 {
            (len + i).max(0)
        } else {
            i.min(len - 1).max(0)
        }
    };
    if len == 0 {
        return (0, -1);
    }
    (norm(start), norm(stop))
}
