//! Per-region price cache with single-flight refresh.
//!
//! Each region's entry sits behind its own async mutex, and the lock is
//! held across the upstream fetch: concurrent callers for the same region
//! wait for the first caller's result instead of issuing duplicate
//! requests, while settled entries for other regions stay readable.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use common::config::CacheConfig;
use common::{PriceSeries, Region};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use vattenfall_client::PriceSource;

/// Read-only snapshot of one region's cache state.
#[derive(Debug, Clone, Default)]
pub struct CacheView {
    /// Most recent successfully fetched series; possibly stale or empty.
    pub prices: PriceSeries,
    /// Detail of the last failed fetch attempt, cleared on success.
    pub last_error: Option<String>,
    /// Total failed fetch attempts since startup.
    pub error_count: u64,
}

#[derive(Debug)]
struct Entry {
    prices: PriceSeries,
    fetched_at: Option<Instant>,
    last_error: Option<String>,
    last_attempt: Option<Instant>,
    cooldown: Duration,
    error_count: u64,
}

impl Entry {
    fn view(&self) -> CacheView {
        CacheView {
            prices: self.prices.clone(),
            last_error: self.last_error.clone(),
            error_count: self.error_count,
        }
    }
}

/// Caches the latest price series per region, refetching through `S` when
/// stale.
pub struct RegionCache<S> {
    source: S,
    refresh_interval: Duration,
    retry_backoff: Duration,
    retry_backoff_max: Duration,
    entries: HashMap<Region, Mutex<Entry>>,
}

impl<S: PriceSource> RegionCache<S> {
    pub fn new(source: S, regions: &[Region], policy: &CacheConfig) -> Self {
        let entries = regions
            .iter()
            .map(|region| {
                let entry = Entry {
                    prices: PriceSeries::default(),
                    fetched_at: None,
                    last_error: None,
                    last_attempt: None,
                    cooldown: policy.retry_backoff(),
                    error_count: 0,
                };
                (region.clone(), Mutex::new(entry))
            })
            .collect();

        Self {
            source,
            refresh_interval: policy.refresh_interval(),
            retry_backoff: policy.retry_backoff(),
            retry_backoff_max: policy.retry_backoff_max(),
            entries,
        }
    }

    /// Current data for `region`, refreshing first if the entry is stale
    /// and not inside a failure cool-down.
    pub async fn get(&self, region: &Region) -> CacheView {
        let Some(cell) = self.entries.get(region) else {
            warn!("Price lookup for unconfigured region {}", region);
            return CacheView {
                last_error: Some(format!("region {} not configured", region)),
                ..CacheView::default()
            };
        };

        // Lock held across the refresh await: this is the single-flight.
        let mut entry = cell.lock().await;
        let now = Instant::now();
        if self.needs_refresh(&entry, now) && !self.cooling_down(&entry, now) {
            self.refresh(region, &mut entry, now).await;
        }
        entry.view()
    }

    fn needs_refresh(&self, entry: &Entry, now: Instant) -> bool {
        match entry.fetched_at {
            None => true,
            Some(at) => now.duration_since(at) >= self.refresh_interval,
        }
    }

    fn cooling_down(&self, entry: &Entry, now: Instant) -> bool {
        entry.last_error.is_some()
            && matches!(entry.last_attempt, Some(at) if now.duration_since(at) < entry.cooldown)
    }

    async fn refresh(&self, region: &Region, entry: &mut Entry, now: Instant) {
        let failing_already = entry.last_error.is_some();
        entry.last_attempt = Some(now);

        match self.source.fetch(region).await {
            Ok(points) => {
                // Replace the series wholesale; the old window is dropped.
                entry.prices = PriceSeries::new(points);
                entry.fetched_at = Some(now);
                entry.last_error = None;
                entry.cooldown = self.retry_backoff;
                debug!("Refreshed {}: {} points", region, entry.prices.len());
            }
            Err(err) => {
                warn!("Price fetch failed for {}: {}", region, err);
                entry.error_count += 1;
                entry.last_error = Some(err.to_string());
                entry.cooldown = if failing_already {
                    (entry.cooldown * 2).min(self.retry_backoff_max)
                } else {
                    self.retry_backoff
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use common::{Error, PricePoint, Result};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    fn region(code: &str) -> Region {
        code.parse().unwrap()
    }

    fn points(prices: &[f64]) -> Vec<PricePoint> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &price)| PricePoint {
                bucket_start: Utc.with_ymd_and_hms(2026, 8, 4, i as u32, 0, 0).unwrap(),
                price,
            })
            .collect()
    }

    /// Mock source with a controllable failure switch and a fetch counter.
    struct MockSource {
        fetches: AtomicUsize,
        fail: AtomicBool,
        delay: Duration,
        prices: Vec<f64>,
    }

    impl MockSource {
        fn new(prices: &[f64]) -> Arc<Self> {
            Arc::new(Self {
                fetches: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
                delay: Duration::ZERO,
                prices: prices.to_vec(),
            })
        }

        fn slow(prices: &[f64], delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                fetches: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
                delay,
                prices: prices.to_vec(),
            })
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PriceSource for Arc<MockSource> {
        async fn fetch(&self, _region: &Region) -> Result<Vec<PricePoint>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                Err(Error::Transport("connection refused".into()))
            } else {
                Ok(points(&self.prices))
            }
        }
    }

    fn policy(refresh_secs: u64, backoff_secs: u64) -> CacheConfig {
        CacheConfig {
            refresh_interval_secs: refresh_secs,
            retry_backoff_secs: backoff_secs,
            retry_backoff_max_secs: backoff_secs.max(1) * 8,
        }
    }

    #[tokio::test]
    async fn test_fresh_entry_skips_fetch() {
        let source = MockSource::new(&[1.0, 2.0]);
        let cache = RegionCache::new(source.clone(), &[region("SN1")], &policy(3600, 30));

        let first = cache.get(&region("SN1")).await;
        let second = cache.get(&region("SN1")).await;

        assert_eq!(source.fetch_count(), 1);
        assert_eq!(first.prices, second.prices);
        assert_eq!(first.prices.len(), 2);
        assert!(first.last_error.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_gets_coalesce_into_one_fetch() {
        let source = MockSource::slow(&[1.0], Duration::from_millis(50));
        let cache = Arc::new(RegionCache::new(
            source.clone(),
            &[region("SN1")],
            &policy(3600, 30),
        ));

        let (a, b) = tokio::join!(cache.get(&region("SN1")), cache.get(&region("SN1")));

        assert_eq!(source.fetch_count(), 1, "second caller must reuse the in-flight fetch");
        assert_eq!(a.prices, b.prices);
        assert_eq!(a.prices.len(), 1);
    }

    #[tokio::test]
    async fn test_regions_fetch_independently() {
        let source = MockSource::new(&[1.0]);
        let regions = [region("SN1"), region("SN2")];
        let cache = RegionCache::new(source.clone(), &regions, &policy(3600, 30));

        let (a, b) = tokio::join!(cache.get(&regions[0]), cache.get(&regions[1]));

        assert_eq!(source.fetch_count(), 2);
        assert!(!a.prices.is_empty());
        assert!(!b.prices.is_empty());
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_data() {
        let source = MockSource::new(&[1.0, 2.0]);
        // Zero refresh interval: every access is stale.
        let cache = RegionCache::new(source.clone(), &[region("SN1")], &policy(0, 0));

        let ok = cache.get(&region("SN1")).await;
        assert_eq!(ok.prices.len(), 2);

        source.fail.store(true, Ordering::SeqCst);
        let stale = cache.get(&region("SN1")).await;

        assert_eq!(stale.prices, ok.prices, "stale-but-available beats unavailable");
        assert!(stale.last_error.is_some());
        assert_eq!(stale.error_count, 1);
    }

    #[tokio::test]
    async fn test_failure_with_no_prior_success_is_empty() {
        let source = MockSource::new(&[1.0]);
        source.fail.store(true, Ordering::SeqCst);
        let cache = RegionCache::new(source.clone(), &[region("SN1")], &policy(3600, 30));

        let view = cache.get(&region("SN1")).await;

        assert!(view.prices.is_empty());
        assert!(view.last_error.is_some());
        assert_eq!(view.error_count, 1);
    }

    #[tokio::test]
    async fn test_cooldown_bounds_failing_refetches() {
        let source = MockSource::new(&[1.0]);
        source.fail.store(true, Ordering::SeqCst);
        // Stale on every access, but a long backoff.
        let cache = RegionCache::new(source.clone(), &[region("SN1")], &policy(0, 60));

        for _ in 0..5 {
            cache.get(&region("SN1")).await;
        }

        assert_eq!(source.fetch_count(), 1, "repeated failing accesses must not hammer upstream");
    }

    #[tokio::test]
    async fn test_recovery_clears_error_marker() {
        let source = MockSource::new(&[1.0]);
        source.fail.store(true, Ordering::SeqCst);
        // Stale on every access, no cool-down: retries immediately.
        let cache = RegionCache::new(source.clone(), &[region("SN1")], &policy(0, 0));

        let failed = cache.get(&region("SN1")).await;
        assert!(failed.last_error.is_some());

        source.fail.store(false, Ordering::SeqCst);
        let recovered = cache.get(&region("SN1")).await;

        assert!(recovered.last_error.is_none());
        assert_eq!(recovered.prices.len(), 1);
        assert_eq!(recovered.error_count, 1, "error count is cumulative");
    }

    #[tokio::test]
    async fn test_unconfigured_region_reports_error() {
        let source = MockSource::new(&[1.0]);
        let cache = RegionCache::new(source.clone(), &[region("SN1")], &policy(3600, 30));

        let view = cache.get(&region("SN9")).await;

        assert!(view.prices.is_empty());
        assert!(view.last_error.is_some());
        assert_eq!(source.fetch_count(), 0);
    }
}
