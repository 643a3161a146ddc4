//! MET Norway Locationforecast client
//!
//! Fetches the `compact` forecast for a coordinate pair and reduces it to the
//! hourly precipitation for the configured window.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::{debug, info, instrument, warn};

use super::ForecastSource;
use crate::config::ForecastConfig;
use crate::models::{HourlyPrecipitation, Place, PrecipitationForecast};
use crate::{RainwatchError, Result};

/// Unauthenticated client for `api.met.no`
#[derive(Debug, Clone)]
pub struct MetNorwayClient {
    client: Client,
    base_url: String,
    hours: u32,
}

impl MetNorwayClient {
    /// Create a new forecast client
    pub fn new(config: &ForecastConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| RainwatchError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            hours: config.hours,
        })
    }

    /// Download the raw compact forecast for a place
    #[instrument(skip(self, place), fields(place = %place.name))]
    pub async fn fetch(&self, place: &Place) -> Result<schema::LocationForecast> {
        // The service only accepts four decimals
        let url = format!(
            "{}/compact?lat={:.4}&lon={:.4}",
            self.base_url, place.latitude, place.longitude
        );
        debug!("Locationforecast request URL: {}", url);

        let start_time = Instant::now();
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Locationforecast returned {} for {}", status, place.name);
            return Err(match status.as_u16() {
                429 => RainwatchError::rate_limit("Locationforecast throttled the request"),
                code => RainwatchError::api(
                    Some(code),
                    format!("Locationforecast request failed: {}", body.trim()),
                ),
            });
        }

        let forecast: schema::LocationForecast = response.json().await.map_err(|e| {
            RainwatchError::parse(format!("Unexpected Locationforecast payload: {e}"))
        })?;

        info!(
            "Retrieved {} forecast steps in {:.3}s",
            forecast.properties.timeseries.len(),
            start_time.elapsed().as_secs_f64()
        );
        Ok(forecast)
    }
}

#[async_trait]
impl ForecastSource for MetNorwayClient {
    async fn forecast(&self, place: &Place, now: DateTime<Utc>) -> Result<PrecipitationForecast> {
        let raw = self.fetch(place).await?;
        summarize_timeseries(&raw.properties.timeseries, now, self.hours)
    }
}

/// Reduce the timeseries to the hourly precipitation of the next `hours` hours.
///
/// A step covers `[time, time + 1h)`; steps that already ended before `now`
/// and steps without a one-hour precipitation amount are skipped.
pub fn summarize_timeseries(
    timeseries: &[schema::TimeStep],
    now: DateTime<Utc>,
    hours: u32,
) -> Result<PrecipitationForecast> {
    let mut hourly = Vec::new();

    for step in timeseries {
        let to = step.time + chrono::Duration::hours(1);
        if to <= now {
            continue;
        }
        let Some(period) = step.data.next_1_hours.as_ref() else {
            continue;
        };
        let Some(details) = period.details.as_ref() else {
            continue;
        };
        let Some(amount_mm) = details.precipitation_amount else {
            continue;
        };
        if !amount_mm.is_finite() || amount_mm < 0.0 {
            return Err(RainwatchError::parse(format!(
                "invalid precipitation amount {amount_mm} at {}",
                step.time
            )));
        }

        hourly.push(HourlyPrecipitation {
            from: step.time,
            to,
            amount_mm,
            min_mm: details.precipitation_amount_min,
            max_mm: details.precipitation_amount_max,
            symbol: period.summary.as_ref().map(|s| s.symbol_code.clone()),
        });

        if hourly.len() == hours as usize {
            break;
        }
    }

    if hourly.is_empty() {
        return Err(RainwatchError::parse("no hourly precipitation data"));
    }

    Ok(PrecipitationForecast::from_hourly(hours, hourly))
}

/// Locationforecast 2.0 `compact` response, reduced to what we read
pub mod schema {
    use chrono::{DateTime, Utc};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct LocationForecast {
        pub properties: Properties,
    }

    #[derive(Debug, Deserialize)]
    pub struct Properties {
        pub timeseries: Vec<TimeStep>,
    }

    #[derive(Debug, Deserialize)]
    pub struct TimeStep {
        pub time: DateTime<Utc>,
        pub data: StepData,
    }

    #[derive(Debug, Deserialize)]
    pub struct StepData {
        pub next_1_hours: Option<Period>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Period {
        pub summary: Option<Summary>,
        pub details: Option<PeriodDetails>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Summary {
        pub symbol_code: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct PeriodDetails {
        pub precipitation_amount: Option<f64>,
        pub precipitation_amount_min: Option<f64>,
        pub precipitation_amount_max: Option<f64>,
    }
}
