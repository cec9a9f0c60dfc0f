//! Vattenfall spot-price API client.
//!
//! Fetches hourly spot prices for a single price area and normalizes every
//! returned timestamp onto its civil-hour bucket. The upstream schema is
//! owned entirely by this crate; everything downstream consumes
//! [`PricePoint`]s through the [`PriceSource`] seam.

use std::error::Error as StdError;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use common::config::UpstreamConfig;
use common::{bucket_of, Error, PricePoint, Region, Result};
use serde::Deserialize;
use tracing::debug;

const USER_AGENT: &str = concat!("vattenfall-exporter/", env!("CARGO_PKG_VERSION"));

/// A source of hourly price data for one region.
///
/// One upstream request per `fetch` call, no internal retries — retry and
/// coalescing policy belongs to the caller.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch(&self, region: &Region) -> Result<Vec<PricePoint>>;
}

// ── Upstream response types ───────────────────────────────────────────

/// One row of `GET /api/price/spot/{area}/{from}/{to}`.
#[derive(Debug, Deserialize)]
struct SpotPriceRow {
    #[serde(rename = "timeStamp")]
    time_stamp: String,
    value: f64,
}

// ── Implementation ────────────────────────────────────────────────────

/// Vattenfall API client with connection pooling and a request timeout.
#[derive(Debug, Clone)]
pub struct VattenfallClient {
    client: reqwest::Client,
    base_url: String,
    tz: Tz,
}

impl VattenfallClient {
    pub fn new(upstream: &UpstreamConfig, tz: Tz) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(4)
            .timeout(upstream.request_timeout())
            .build()
            .expect("failed to build Vattenfall HTTP client");

        Self {
            client,
            base_url: normalize_base_url(&upstream.base_url),
            tz,
        }
    }

    fn price_url(&self, region: &Region) -> String {
        // Request today plus tomorrow in the upstream's civil calendar;
        // next-day prices appear there once published.
        let today = Utc::now().with_timezone(&self.tz).date_naive();
        let tomorrow = today + chrono::Duration::days(1);
        format!(
            "{}/api/price/spot/{}/{}/{}?lang=fi",
            self.base_url,
            region,
            today.format("%Y-%m-%d"),
            tomorrow.format("%Y-%m-%d"),
        )
    }
}

#[async_trait]
impl PriceSource for VattenfallClient {
    async fn fetch(&self, region: &Region) -> Result<Vec<PricePoint>> {
        let url = self.price_url(region);
        debug!("Fetching spot prices: {}", url);

        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::Transport(format_reqwest_error(&e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::UpstreamStatus {
                status: status.as_u16(),
                message: summarize_response_body(&body),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::Transport(format_reqwest_error(&e)))?;

        let points = parse_prices(&body, self.tz)?;
        debug!("Got {} price points for {}", points.len(), region);
        Ok(points)
    }
}

/// Parse an upstream response body into bucketed price points.
pub fn parse_prices(body: &str, tz: Tz) -> Result<Vec<PricePoint>> {
    let rows: Vec<SpotPriceRow> =
        serde_json::from_str(body).map_err(|e| Error::Parse(format!("spot price body: {}", e)))?;

    rows.into_iter()
        .map(|row| {
            let instant: DateTime<Utc> = DateTime::parse_from_rfc3339(&row.time_stamp)
                .map_err(|e| Error::Parse(format!("timestamp {:?}: {}", row.time_stamp, e)))?
                .with_timezone(&Utc);
            Ok(PricePoint {
                bucket_start: bucket_of(instant, tz)?,
                price: row.value,
            })
        })
        .collect()
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn format_reqwest_error(err: &reqwest::Error) -> String {
    // Keep chained causes so network failures (DNS/TLS/socket) are visible.
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        let cause_msg = cause.to_string();
        if !cause_msg.is_empty() && !message.contains(&cause_msg) {
            message.push_str(": ");
            message.push_str(&cause_msg);
        }
        source = cause.source();
    }

    message
}

fn summarize_response_body(raw: &str) -> String {
    const MAX_CHARS: usize = 500;
    let compact = raw.replace('\n', " ").replace('\r', " ");
    match compact.char_indices().nth(MAX_CHARS) {
        Some((idx, _)) => format!("{}…", &compact[..idx]),
        None => compact,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Helsinki;

    fn sample_body() -> &'static str {
        r#"[
            {"timeStamp": "2026-08-04T10:00:00+03:00", "value": 4.21},
            {"timeStamp": "2026-08-04T11:00:00+03:00", "value": 3.87},
            {"timeStamp": "2026-08-04T12:00:00+03:00", "value": -0.12}
        ]"#
    }

    #[test]
    fn test_parse_well_formed_body() {
        let points = parse_prices(sample_body(), Helsinki).unwrap();

        assert_eq!(points.len(), 3);
        // 10:00+03 is 07:00Z.
        assert_eq!(
            points[0].bucket_start,
            Utc.with_ymd_and_hms(2026, 8, 4, 7, 0, 0).unwrap()
        );
        assert_eq!(points[0].price, 4.21);
        // Negative prices pass through unchanged.
        assert_eq!(points[2].price, -0.12);
    }

    #[test]
    fn test_parse_rebucket_round_trip() {
        // A parsed point's bucket agrees with bucketing its original
        // timestamp directly, including mid-hour stamps.
        let body = r#"[{"timeStamp": "2026-08-04T10:42:17+03:00", "value": 1.0}]"#;
        let points = parse_prices(body, Helsinki).unwrap();

        let original = DateTime::parse_from_rfc3339("2026-08-04T10:42:17+03:00")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(points[0].bucket_start, bucket_of(original, Helsinki).unwrap());
        assert_eq!(
            points[0].bucket_start,
            bucket_of(points[0].bucket_start, Helsinki).unwrap()
        );
    }

    #[test]
    fn test_parse_rejects_malformed_body() {
        assert!(matches!(
            parse_prices("not json", Helsinki),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            parse_prices(r#"{"prices": []}"#, Helsinki),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            parse_prices(r#"[{"timeStamp": "yesterday", "value": 1.0}]"#, Helsinki),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_parse_empty_body() {
        let points = parse_prices("[]", Helsinki).unwrap();
        assert!(points.is_empty());
    }

    #[test]
    fn test_summarize_response_body_truncates() {
        let long = "x".repeat(2000);
        let summary = summarize_response_body(&long);
        assert!(summary.chars().count() <= 501);
        assert!(summary.ends_with('…'));
    }
}
