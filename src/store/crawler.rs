//! Background Cache Crawler
//!
//! A single Tokio task that wakes once a second and does the housekeeping
//! the hot path refuses to do:
//!
//! 1. Refreshes the store's cached wall-clock seconds.
//! 2. After a flush, reclaims records hidden behind the barrier.
//! 3. While the store is over its memory budget, evicts cold records.
//!
//! The hot path only ever evicts a single record inline; everything else is
//! deferred here so client commands stay fast.

use crate::store::SharedStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Configuration for the crawler.
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Interval between passes (default: 1s).
    pub interval: Duration,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

/// A handle to the running crawler.
///
/// When this handle is dropped, the crawler task will be stopped.
#[derive(Debug)]
pub struct Crawler {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
}

impl Crawler {
    /// Starts the crawler as a background task.
    ///
    /// # Returns
    ///
    /// Returns a handle that can be used to stop the crawler. The crawler
    /// will automatically stop when the handle is dropped.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use triekv::store::{Crawler, CrawlerConfig, SharedStore};
    /// use std::sync::Arc;
    ///
    /// let store = Arc::new(SharedStore::new());
    /// let crawler = Crawler::start(Arc::clone(&store), CrawlerConfig::default());
    ///
    /// // Crawler runs in the background...
    ///
    /// // Dropping the handle stops it
    /// drop(crawler);
    /// ```
    pub fn start(store: Arc<SharedStore>, config: CrawlerConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(crawl_loop(store, config, shutdown_rx));

        info!("Background cache crawler started");

        Self { shutdown_tx }
    }

    /// Stops the crawler.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        info!("Background cache crawler stopped");
    }
}

impl Drop for Crawler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main crawler loop.
async fn crawl_loop(
    store: Arc<SharedStore>,
    config: CrawlerConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    // Starting from zero means a barrier installed before the crawler came
    // up is still swept on the first pass.
    let mut last_barrier = 0u64;

    loop {
        // Wait for the interval or shutdown signal
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Crawler received shutdown signal");
                    return;
                }
            }
        }

        store.refresh_now();

        let barrier = store.flush_barrier();
        if barrier > last_barrier {
            let removed = store.sweep_flushed();
            last_barrier = barrier;
            if removed > 0 {
                debug!(
                    removed = removed,
                    remaining = store.len(),
                    "Reclaimed flushed records"
                );
            }
        }

        let limit = store.memory_limit();
        if limit > 0 {
            let mut evicted = 0u64;
            while store.bytes_used() > limit {
                if !store.evict_one() {
                    break;
                }
                evicted += 1;
            }
            if evicted > 0 {
                debug!(
                    evicted = evicted,
                    bytes_used = store.bytes_used(),
                    "Evicted records over memory budget"
                );
            }
        }
    }
}

/// Starts the crawler with default configuration.
///
/// This is a convenience function for simple use cases.
pub fn start_crawler(store: Arc<SharedStore>) -> Crawler {
    Crawler::start(store, CrawlerConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Record;
    use bytes::Bytes;

    fn record(key: &str, value: &str) -> Record {
        Record::new(
            Bytes::from(key.to_string()),
            0,
            0,
            Bytes::from(value.to_string()),
        )
    }

    #[tokio::test]
    async fn test_crawler_reclaims_flushed_records() {
        let store = Arc::new(SharedStore::new());

        for i in 0..10 {
            store.set(record(&format!("key{i}"), "value")).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
        store.flush();

        let config = CrawlerConfig {
            interval: Duration::from_millis(10),
        };
        let _crawler = Crawler::start(Arc::clone(&store), config);

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_crawler_evicts_down_to_limit() {
        let store = Arc::new(SharedStore::new());

        for i in 0..100 {
            store
                .set(record(&format!("key{i}"), "0123456789abcdef"))
                .unwrap();
        }
        let target = store.bytes_used() / 4;
        store.set_memory_limit(target);

        let config = CrawlerConfig {
            interval: Duration::from_millis(10),
        };
        let _crawler = Crawler::start(Arc::clone(&store), config);

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(
            store.bytes_used() <= target,
            "still {} bytes over a {} byte budget",
            store.bytes_used(),
            target
        );
    }

    #[tokio::test]
    async fn test_crawler_stops_on_drop() {
        let store = Arc::new(SharedStore::new());

        {
            let _crawler = Crawler::start(
                Arc::clone(&store),
                CrawlerConfig {
                    interval: Duration::from_millis(10),
                },
            );
            tokio::time::sleep(Duration::from_millis(30)).await;
            // Crawler is dropped here
        }
        tokio::time::sleep(Duration::from_millis(30)).await;

        // A flush after shutdown stays unswept.
        store.set(record("key", "value")).unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        store.flush();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.len(), 1);
    }
}
