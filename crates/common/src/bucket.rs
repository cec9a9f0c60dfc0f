//! Civil-hour bucketing.
//!
//! Spot prices are published per local hour, so every timestamp in the
//! system is normalized to the start of its containing hour in the
//! deployment's timezone. Bucketing works on the absolute instant: during
//! a fall-back transition the repeated wall-clock hour maps to two distinct
//! buckets, one per UTC offset.

use chrono::{DateTime, Offset, Utc};
use chrono_tz::Tz;

use crate::error::Error;

const SECS_PER_HOUR: i64 = 3600;

/// Truncate `instant` to the start of its containing civil hour in `tz`,
/// returned as the equivalent UTC instant.
pub fn bucket_of(instant: DateTime<Utc>, tz: Tz) -> Result<DateTime<Utc>, Error> {
    let offset_secs = i64::from(instant.with_timezone(&tz).offset().fix().local_minus_utc());

    // Truncate the local wall-clock timestamp to the hour using the
    // instant's own offset. Wall-clock hour starts always fall on multiples
    // of 3600 local seconds, for any tzdata offset.
    let local_secs = instant.timestamp() + offset_secs;
    let bucket_local_secs = local_secs - local_secs.rem_euclid(SECS_PER_HOUR);
    let bucket_secs = bucket_local_secs - offset_secs;

    DateTime::<Utc>::from_timestamp(bucket_secs, 0)
        .ok_or_else(|| Error::Bucket(format!("instant {} is out of range", instant)))
}
