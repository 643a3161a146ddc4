//! The fetch-aggregate step behind every page load

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{info, instrument, warn};

use crate::aggregate::{combine, group_by_station};
use crate::models::{Availability, CombinedRow, Place, Report};
use crate::weather::{ForecastSource, ObservationSource};
use crate::{RainwatchError, Result};

/// Runs both upstream clients for every place and builds the report
#[derive(Clone)]
pub struct PrecipitationService {
    places: Arc<[Place]>,
    forecasts: Arc<dyn ForecastSource>,
    observations: Arc<dyn ObservationSource>,
    forecast_hours: u32,
    /// Upper bound for each upstream call of a run
    call_timeout: Option<Duration>,
}

impl PrecipitationService {
    pub fn new(
        places: Vec<Place>,
        forecasts: Arc<dyn ForecastSource>,
        observations: Arc<dyn ObservationSource>,
        forecast_hours: u32,
    ) -> Self {
        Self {
            places: places.into(),
            forecasts,
            observations,
            forecast_hours,
            call_timeout: None,
        }
    }

    /// Give up on an upstream call after `timeout`; it then shows as unavailable
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn places(&self) -> &[Place] {
        &self.places
    }

    /// Fetch everything for every place. Upstream failures become unavailable
    /// cells, so this never fails.
    #[instrument(skip(self), fields(places = self.places.len()))]
    pub async fn run(&self, now: DateTime<Utc>) -> Report {
        let rows = join_all(self.places.iter().map(|place| self.run_place(place, now))).await;
        let stations = group_by_station(&rows);

        let forecasts = rows.iter().filter(|r| r.forecast.is_available()).count();
        let observations = rows.iter().filter(|r| r.observation.is_available()).count();
        info!(
            "Report ready: {} rows, {} forecasts, {} observations, {} stations",
            rows.len(),
            forecasts,
            observations,
            stations.len()
        );

        Report {
            generated_at: now,
            forecast_hours: self.forecast_hours,
            rows,
            stations,
        }
    }

    async fn run_place(&self, place: &Place, now: DateTime<Utc>) -> CombinedRow {
        let (forecast, observation) = tokio::join!(
            self.bounded(self.forecasts.forecast(place, now)),
            self.bounded(self.observations.observe(place, now))
        );

        if let Err(e) = &forecast {
            warn!("Forecast unavailable for {}: {}", place.name, e);
        }
        if let Err(e) = &observation {
            warn!("Observation unavailable for {}: {}", place.name, e);
        }

        combine(
            place,
            Availability::from_result(forecast),
            Availability::from_result(observation),
        )
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        let Some(limit) = self.call_timeout else {
            return call.await;
        };
        tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
            Err(RainwatchError::network(format!(
                "no answer within {:.1}s",
                limit.as_secs_f64()
            )))
        })
    }
}
