//! Frost observation client
//!
//! Looks up the climate stations closest to a place and reads their daily
//! precipitation sums for the last few days. Every request carries the client
//! id as basic auth username.
//!
//! Station lookups are cached per place name for the lifetime of the client,
//! so after the first lookup a page load costs one observations request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use futures::future::join_all;
use tokio::sync::RwLock;
use haversine::{Location as HaversineLocation, Units, distance};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, info, instrument, warn};

use super::ObservationSource;
use crate::config::{CREDENTIAL_VAR, ObservationConfig};
use crate::models::{
    DailyObservation, NearbyStation, Place, PlaceObservation, Station, StationReading,
};
use crate::{RainwatchError, Result};

/// Daily precipitation sum element
pub const PRECIPITATION_ELEMENT: &str = "sum(precipitation_amount P1D)";

const TARGET_RESOLUTION: &str = "P1D";

/// Authenticated client for `frost.met.no`
#[derive(Debug, Clone)]
pub struct FrostClient {
    client: Client,
    base_url: String,
    client_id: Option<String>,
    /// Nearest stations per place name
    stations: Arc<RwLock<HashMap<String, Arc<[NearbyStation]>>>>,
    days: u32,
    station_search: u32,
    stations_per_day: usize,
    preferred_offset: String,
}

impl FrostClient {
    /// Create a new observation client; a missing client id is not an error here
    pub fn new(config: &ObservationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("rainwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RainwatchError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            stations: Arc::default(),
            days: config.days,
            station_search: config.station_search,
            stations_per_day: config.stations_per_day,
            preferred_offset: config.preferred_offset.clone(),
        })
    }

    #[must_use]
    pub fn has_credential(&self) -> bool {
        self.client_id.is_some()
    }

    fn credential(&self) -> Result<&str> {
        self.client_id
            .as_deref()
            .ok_or_else(|| RainwatchError::missing_credential(CREDENTIAL_VAR))
    }

    async fn get(&self, url: &str) -> Result<Response> {
        let client_id = self.credential()?;
        debug!("Frost request URL: {}", url);
        Ok(self
            .client
            .get(url)
            .basic_auth(client_id, Some(""))
            .send()
            .await?)
    }

    /// Stations closest to the place, nearest first
    #[instrument(skip(self, place), fields(place = %place.name))]
    pub async fn nearest_stations(&self, place: &Place) -> Result<Vec<NearbyStation>> {
        let geometry = format!("nearest(POINT({} {}))", place.longitude, place.latitude);
        let url = format!(
            "{}/sources/v0.jsonld?types=SensorSystem&elements={}&geometry={}&nearestmaxcount={}",
            self.base_url,
            urlencoding::encode(PRECIPITATION_ELEMENT),
            urlencoding::encode(&geometry),
            self.station_search
        );

        let response = check_response(self.get(&url).await?).await?;
        let sources: schema::SourcesResponse = response
            .json()
            .await
            .map_err(|e| RainwatchError::parse(format!("Unexpected Frost sources payload: {e}")))?;

        let stations = rank_stations(place, sources.data);
        if stations.is_empty() {
            return Err(RainwatchError::api(
                None,
                format!("no climate stations near {}", place.name),
            ));
        }
        debug!("Found {} stations near {}", stations.len(), place.name);
        Ok(stations)
    }

    /// Cached station list for the place, looked up on first use
    pub async fn stations_for(&self, place: &Place) -> Result<Arc<[NearbyStation]>> {
        if let Some(stations) = self.stations.read().await.get(&place.name) {
            return Ok(Arc::clone(stations));
        }

        let stations: Arc<[NearbyStation]> = self.nearest_stations(place).await?.into();
        self.stations
            .write()
            .await
            .insert(place.name.clone(), Arc::clone(&stations));
        Ok(stations)
    }

    /// Resolve the stations of every place up front. Failures are logged and
    /// retried on the first page load. Returns how many places resolved.
    pub async fn warm_up(&self, places: &[Place]) -> usize {
        if !self.has_credential() {
            return 0;
        }
        let results = join_all(places.iter().map(|place| self.stations_for(place))).await;

        let mut resolved = 0;
        for (place, result) in places.iter().zip(results) {
            match result {
                Ok(_) => resolved += 1,
                Err(e) => warn!("Station lookup failed for {}: {}", place.name, e),
            }
        }
        info!("Resolved stations for {}/{} places", resolved, places.len());
        resolved
    }

    /// Raw daily sums for the given stations with reference dates in `[first, end)`
    #[instrument(skip(self, station_ids))]
    pub async fn fetch_observations(
        &self,
        station_ids: &[&str],
        first: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<schema::ObservationSeries>> {
        let url = format!(
            "{}/observations/v0.jsonld?sources={}&elements={}&referencetime={}",
            self.base_url,
            urlencoding::encode(&station_ids.join(",")),
            urlencoding::encode(PRECIPITATION_ELEMENT),
            urlencoding::encode(&format!("{first}/{end}")),
        );

        let response = self.get(&url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            // Frost answers 404 when none of the stations reported
            info!("Frost has no observations for {} .. {}", first, end);
            return Ok(Vec::new());
        }

        let response = check_response(response).await?;
        let observations: schema::ObservationsResponse = response.json().await.map_err(|e| {
            RainwatchError::parse(format!("Unexpected Frost observations payload: {e}"))
        })?;
        Ok(observations.data)
    }
}

#[async_trait]
impl ObservationSource for FrostClient {
    async fn observe(&self, place: &Place, now: DateTime<Utc>) -> Result<PlaceObservation> {
        self.credential()?;
        let start_time = Instant::now();

        let stations = self.stations_for(place).await?;
        let today = now.date_naive();
        let first = today
            .checked_sub_days(Days::new(u64::from(self.days)))
            .ok_or_else(|| RainwatchError::validation("observation window before year 0"))?;

        let ids: Vec<&str> = stations.iter().map(|s| s.station.id.as_str()).collect();
        let series = self.fetch_observations(&ids, first, today).await?;
        let values = extract_observations(&series, &self.preferred_offset);

        let days = (1..=self.days)
            .filter_map(|back| today.checked_sub_days(Days::new(u64::from(back))))
            .map(|date| DailyObservation {
                reference_date: date,
                readings: closest_valid(&values, &stations, date, self.stations_per_day),
            })
            .collect();

        info!(
            "Observations for {} ready in {:.3}s",
            place.name,
            start_time.elapsed().as_secs_f64()
        );
        Ok(PlaceObservation { days })
    }
}

/// Map Frost error statuses onto our error kinds
async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<schema::ErrorResponse>(&body)
        .map(|e| format!("{} ({})", e.error.message, e.error.reason))
        .unwrap_or_else(|_| body.trim().to_string());
    warn!("Could not get Frost data: {} - {}", status, detail);

    Err(match status.as_u16() {
        401 | 403 => RainwatchError::authentication(detail),
        429 => RainwatchError::rate_limit(detail),
        code => RainwatchError::api(Some(code), detail),
    })
}

/// Turn Frost sources into stations sorted by distance to the place
pub fn rank_stations(place: &Place, sources: Vec<schema::Source>) -> Vec<NearbyStation> {
    let mut stations: Vec<NearbyStation> = sources
        .into_iter()
        .filter_map(|source| {
            let geometry = source.geometry?;
            let [longitude, latitude] = match geometry.coordinates.as_slice() {
                [lon, lat, ..] => [*lon, *lat],
                _ => return None,
            };
            let distance_km = distance(
                HaversineLocation {
                    latitude: place.latitude,
                    longitude: place.longitude,
                },
                HaversineLocation {
                    latitude,
                    longitude,
                },
                Units::Kilometers,
            );
            Some(NearbyStation {
                station: Station {
                    id: source.id,
                    name: source.name.unwrap_or_default(),
                    latitude,
                    longitude,
                    masl: source.masl,
                },
                distance_km,
            })
        })
        .collect();

    stations.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    stations
}

/// One chosen daily value per (station, date)
#[derive(Debug, Clone, PartialEq)]
pub struct DailyValue {
    pub time_offset: String,
    pub value_mm: f64,
}

/// Pick the daily precipitation sums out of the raw series.
///
/// Only sensor index `0` counts. Among the offsets reported for a day the
/// preferred one wins, otherwise the first reported.
pub fn extract_observations(
    series: &[schema::ObservationSeries],
    preferred_offset: &str,
) -> HashMap<(String, NaiveDate), DailyValue> {
    let mut candidates: HashMap<(String, NaiveDate), Vec<DailyValue>> = HashMap::new();

    for item in series {
        let (source, sensor) = item
            .source_id
            .split_once(':')
            .unwrap_or((item.source_id.as_str(), "0"));
        if sensor != "0" {
            continue;
        }
        let date = item.reference_time.date_naive();

        for obs in &item.observations {
            if obs.time_resolution.as_deref() != Some(TARGET_RESOLUTION) {
                continue;
            }
            if !obs.element_id.contains("precipitation") {
                continue;
            }
            let Some(value_mm) = obs.value.filter(|v| v.is_finite() && *v >= 0.0) else {
                continue;
            };
            candidates
                .entry((source.to_string(), date))
                .or_default()
                .push(DailyValue {
                    time_offset: obs.time_offset.clone().unwrap_or_default(),
                    value_mm,
                });
        }
    }

    candidates
        .into_iter()
        .filter_map(|(key, values)| {
            let chosen = values
                .iter()
                .find(|v| v.time_offset == preferred_offset)
                .or_else(|| values.first())
                .cloned()?;
            Some((key, chosen))
        })
        .collect()
}

/// Readings for `date` from the closest stations that reported, at most `limit`
pub fn closest_valid(
    values: &HashMap<(String, NaiveDate), DailyValue>,
    stations: &[NearbyStation],
    date: NaiveDate,
    limit: usize,
) -> Vec<StationReading> {
    stations
        .iter()
        .filter_map(|nearby| {
            values
                .get(&(nearby.station.id.clone(), date))
                .map(|value| StationReading {
                    station: nearby.clone(),
                    time_offset: value.time_offset.clone(),
                    value_mm: value.value_mm,
                })
        })
        .take(limit)
        .collect()
}

/// Frost JSON-LD payloads, reduced to what we read
pub mod schema {
    use chrono::{DateTime, Utc};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct SourcesResponse {
        pub data: Vec<Source>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Source {
        pub id: String,
        pub name: Option<String>,
        pub geometry: Option<Geometry>,
        pub masl: Option<f64>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Geometry {
        /// `[longitude, latitude]`
        pub coordinates: Vec<f64>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ObservationsResponse {
        pub data: Vec<ObservationSeries>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ObservationSeries {
        /// `SN18700:0`
        pub source_id: String,
        pub reference_time: DateTime<Utc>,
        pub observations: Vec<Observation>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Observation {
        pub element_id: String,
        pub value: Option<f64>,
        pub time_offset: Option<String>,
        pub time_resolution: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ErrorResponse {
        pub error: ErrorDetail,
    }

    #[derive(Debug, Deserialize)]
    pub struct ErrorDetail {
        pub message: String,
        #[serde(default)]
        pub reason: String,
    }
}
