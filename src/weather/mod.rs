//! Upstream weather services
//!
//! Two read-only REST clients, one per data source. The pipeline talks to them
//! through the traits below so a failing or absent source only degrades its
//! own cells.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::Result;
use crate::models::{Place, PlaceObservation, PrecipitationForecast};

pub mod frost;
pub mod met_norway;

pub use frost::FrostClient;
pub use met_norway::MetNorwayClient;

/// Predicted precipitation for the hours after `now`
#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn forecast(&self, place: &Place, now: DateTime<Utc>) -> Result<PrecipitationForecast>;
}

/// Measured precipitation for the days before `now`
#[async_trait]
pub trait ObservationSource: Send + Sync {
    async fn observe(&self, place: &Place, now: DateTime<Utc>) -> Result<PlaceObservation>;
}
