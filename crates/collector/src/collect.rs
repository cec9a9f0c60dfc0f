//! Prometheus collector for the current spot price per region.
//!
//! Implements the `describe`/`collect` contract of
//! [`prometheus::core::Collector`] so the instance can be registered into
//! any caller-supplied [`prometheus::Registry`]. Each scrape runs one
//! collection pass: region lookups fan out concurrently, and every region
//! whose cache holds a price for the bucket containing "now" contributes
//! exactly one gauge sample.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use common::{bucket_of, Error, Region, Result};
use futures::future::join_all;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, IntCounterVec, Opts};
use tracing::warn;
use vattenfall_client::PriceSource;

use crate::cache::RegionCache;

pub const PRICE_METRIC: &str = "vattenfall_spot_price_cents_per_kwh";
pub const PRICE_HELP: &str = "Electricity spot price for the current hour, in cents per kWh.";
pub const ERRORS_METRIC: &str = "vattenfall_fetch_errors_total";
pub const ERRORS_HELP: &str = "Total failed upstream price fetch attempts.";

const REGION_LABEL: &str = "region";

pub struct SpotPriceCollector<S> {
    cache: Arc<RegionCache<S>>,
    regions: Vec<Region>,
    tz: Tz,
    descs: Vec<Desc>,
}

impl<S: PriceSource> SpotPriceCollector<S> {
    pub fn new(cache: Arc<RegionCache<S>>, regions: Vec<Region>, tz: Tz) -> Result<Self> {
        let descs = vec![
            Desc::new(
                PRICE_METRIC.into(),
                PRICE_HELP.into(),
                vec![REGION_LABEL.into()],
                HashMap::new(),
            )
            .map_err(|e| Error::Metrics(e.to_string()))?,
            Desc::new(
                ERRORS_METRIC.into(),
                ERRORS_HELP.into(),
                vec![REGION_LABEL.into()],
                HashMap::new(),
            )
            .map_err(|e| Error::Metrics(e.to_string()))?,
        ];

        Ok(Self {
            cache,
            regions,
            tz,
            descs,
        })
    }

    /// One collection pass. Regions with no price for the current bucket
    /// are omitted from the sample set; they never abort the pass.
    pub async fn gather(&self) -> Vec<MetricFamily> {
        let views = join_all(self.regions.iter().map(|r| self.cache.get(r))).await;

        let bucket = match bucket_of(Utc::now(), self.tz) {
            Ok(bucket) => bucket,
            Err(e) => {
                warn!("Skipping price samples: {}", e);
                return Vec::new();
            }
        };

        // Fresh per-pass metric vectors: the emitted set is exactly the
        // cache state read during this pass, never leftovers.
        let gauge = GaugeVec::new(Opts::new(PRICE_METRIC, PRICE_HELP), &[REGION_LABEL])
            .expect("statically valid gauge opts");
        let errors = IntCounterVec::new(Opts::new(ERRORS_METRIC, ERRORS_HELP), &[REGION_LABEL])
            .expect("statically valid counter opts");

        for (region, view) in self.regions.iter().zip(views) {
            if view.error_count > 0 {
                errors
                    .with_label_values(&[region.as_str()])
                    .inc_by(view.error_count);
            }
            if let Some(point) = view.prices.at(bucket) {
                gauge.with_label_values(&[region.as_str()]).set(point.price);
            }
        }

        let mut families = gauge.collect();
        families.extend(errors.collect());
        families
    }
}

impl<S: PriceSource + 'static> Collector for SpotPriceCollector<S> {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        // The registry's collect pass is synchronous; bridge onto the
        // multi-thread runtime for the fan-out.
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(self.gather())
        })
    }
}
