//! Forecast projection: future price points per region.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use common::{bucket_of, Region};
use futures::future::join_all;
use serde::Serialize;
use tracing::warn;
use vattenfall_client::PriceSource;

use crate::cache::RegionCache;

/// One future hour in the forecast feed, stamped in the deployment's
/// local time.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastPoint {
    pub start_time: DateTime<FixedOffset>,
    pub price: f64,
}

/// Region code → ascending future price points. BTreeMap keeps the key
/// order stable across responses.
pub type ForecastResponse = BTreeMap<String, Vec<ForecastPoint>>;

pub struct ForecastProjector<S> {
    cache: Arc<RegionCache<S>>,
    regions: Vec<Region>,
    tz: Tz,
}

impl<S: PriceSource> ForecastProjector<S> {
    pub fn new(cache: Arc<RegionCache<S>>, regions: Vec<Region>, tz: Tz) -> Self {
        Self { cache, regions, tz }
    }

    /// Future price points per configured region, from the bucket
    /// containing "now" through the end of known data. A region with no
    /// future data yields an empty array, never an error.
    pub async fn forecast(&self) -> ForecastResponse {
        let views = join_all(self.regions.iter().map(|r| self.cache.get(r))).await;

        let bucket = match bucket_of(Utc::now(), self.tz) {
            Ok(bucket) => bucket,
            Err(e) => {
                warn!("Skipping forecast window: {}", e);
                return self
                    .regions
                    .iter()
                    .map(|r| (r.to_string(), Vec::new()))
                    .collect();
            }
        };

        self.regions
            .iter()
            .zip(views)
            .map(|(region, view)| {
                let points = view
                    .prices
                    .from_bucket(bucket)
                    .iter()
                    .map(|p| ForecastPoint {
                        start_time: p.bucket_start.with_timezone(&self.tz).fixed_offset(),
                        price: p.price,
                    })
                    .collect();
                (region.to_string(), points)
            })
            .collect()
    }
}
