//! Domain types shared across the exporter.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A pricing zone identifier, e.g. `SN1`.
///
/// Parsed once from configuration and compared by value everywhere else.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Region(String);

impl Region {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Region {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::Config("region must not be empty".into()));
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::Config(format!(
                "region {:?} must be alphanumeric",
                trimmed
            )));
        }
        Ok(Region(trimmed.to_ascii_uppercase()))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One hour of spot price data.
///
/// `bucket_start` is always the start of a civil hour in the deployment's
/// timezone, expressed as the equivalent UTC instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub bucket_start: DateTime<Utc>,
    pub price: f64,
}

/// Price points for one region, sorted ascending by bucket start with
/// duplicate buckets dropped (first occurrence wins).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries(Vec<PricePoint>);

impl PriceSeries {
    pub fn new(mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.bucket_start);
        points.dedup_by_key(|p| p.bucket_start);
        PriceSeries(points)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.0
    }

    /// The point whose bucket starts exactly at `bucket`, if cached.
    pub fn at(&self, bucket: DateTime<Utc>) -> Option<&PricePoint> {
        self.0
            .binary_search_by_key(&bucket, |p| p.bucket_start)
            .ok()
            .map(|idx| &self.0[idx])
    }

    /// All points with `bucket_start >= bucket`, in ascending order.
    pub fn from_bucket(&self, bucket: DateTime<Utc>) -> &[PricePoint] {
        let start = self.0.partition_point(|p| p.bucket_start < bucket);
        &self.0[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hour(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 4, h, 0, 0).unwrap()
    }

    fn point(h: u32, price: f64) -> PricePoint {
        PricePoint {
            bucket_start: hour(h),
            price,
        }
    }

    #[test]
    fn test_region_parsing() {
        let region: Region = " sn1 ".parse().unwrap();
        assert_eq!(region.as_str(), "SN1");
        assert_eq!(region, "SN1".parse().unwrap());

        assert!("".parse::<Region>().is_err());
        assert!("  ".parse::<Region>().is_err());
        assert!("SN-1".parse::<Region>().is_err());
    }

    #[test]
    fn test_series_sorts_and_dedups() {
        let series = PriceSeries::new(vec![point(11, 3.0), point(9, 1.0), point(9, 9.0), point(10, 2.0)]);

        let buckets: Vec<u32> = series
            .points()
            .iter()
            .map(|p| {
                use chrono::Timelike;
                p.bucket_start.hour()
            })
            .collect();
        assert_eq!(buckets, vec![9, 10, 11]);
        // First occurrence of the duplicated 09:00 bucket wins.
        assert_eq!(series.at(hour(9)).unwrap().price, 1.0);
    }

    #[test]
    fn test_at_and_from_bucket() {
        let series = PriceSeries::new(vec![point(9, 1.0), point(10, 2.0), point(11, 3.0)]);

        assert_eq!(series.at(hour(10)).unwrap().price, 2.0);
        assert!(series.at(hour(12)).is_none());

        let future = series.from_bucket(hour(10));
        assert_eq!(future.len(), 2);
        assert_eq!(future[0].price, 2.0);
        assert_eq!(future[1].price, 3.0);

        assert!(series.from_bucket(hour(12)).is_empty());
        assert_eq!(series.from_bucket(hour(8)).len(), 3);
    }
}
