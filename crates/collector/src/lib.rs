//! Region price cache and its two consumers: the Prometheus collector and
//! the forecast projector.

pub mod cache;
pub mod collect;
pub mod forecast;

pub use cache::{CacheView, RegionCache};
pub use collect::SpotPriceCollector;
pub use forecast::{ForecastPoint, ForecastProjector, ForecastResponse};
