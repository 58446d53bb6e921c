//! The `SourceAdapter` boundary: the only interface this binary has to an
//! actual crawler (spec §1 Out-of-scope — "the raw crawlers themselves...
//! specified only by their interfaces").
//!
//! Grounded in the same dependency-injection shape `pulse-analyze::sentiment
//! ::SentimentOracle` uses for the sentiment model, and in `control_center.py
//! ::CrawlerControlCenter`'s per-source registry (`self.crawlers['reddit']
//! = RedditCrawler(...)`) generalized into a trait object list instead of a
//! hand-maintained dict of concrete crawler classes.

use async_trait::async_trait;
use pulse_core::{RawItem, Result};

/// One external content source. Real implementations (Reddit, RSS, NewsAPI,
/// StockTwits, Alpha Vantage, Twitter...) live outside this repo; this
/// binary only knows how to drive whatever is injected.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// The source tag used for per-source statistics and logging.
    fn name(&self) -> &str;

    /// Fetches whatever is newly available since the adapter's own
    /// internal bookkeeping. Adapters are responsible for their own
    /// pagination/cursor state; a pass simply drains whatever `fetch`
    /// returns.
    async fn fetch(&self) -> Result<Vec<RawItem>>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// A fixed-output adapter for pass tests, standing in for a real
    /// crawler the same way `HeuristicOracle` stands in for a real model.
    pub struct FixedAdapter {
        name: String,
        items: Mutex<Vec<RawItem>>,
    }

    impl FixedAdapter {
        pub fn new(name: &str, items: Vec<RawItem>) -> Self {
            Self {
                name: name.to_string(),
                items: Mutex::new(items),
            }
        }
    }

    #[async_trait]
    impl SourceAdapter for FixedAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        async fn fetch(&self) -> Result<Vec<RawItem>> {
            Ok(std::mem::take(&mut self.items.lock().unwrap()))
        }
    }
}
