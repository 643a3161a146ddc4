//! Precipitation values coming out of the forecast and observation clients

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A value that may not have been obtained.
///
/// `Unavailable` is distinct from a zero reading: it means the upstream call
/// failed, returned unexpected data, or was never made.
#[derive(Debug, Clone, PartialEq)]
pub enum Availability<T> {
    Available(T),
    Unavailable { reason: String },
}

impl<T> Availability<T> {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Keep the value on `Ok`, turn any error into the unavailable marker
    pub fn from_result<E: fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Available(value),
            Err(err) => Self::unavailable(err.to_string()),
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    #[must_use]
    pub fn as_option(&self) -> Option<&T> {
        match self {
            Self::Available(value) => Some(value),
            Self::Unavailable { .. } => None,
        }
    }

    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Available(_) => None,
            Self::Unavailable { reason } => Some(reason),
        }
    }

    pub fn map<U>(&self, f: impl FnOnce(&T) -> U) -> Availability<U> {
        match self {
            Self::Available(value) => Availability::Available(f(value)),
            Self::Unavailable { reason } => Availability::unavailable(reason.clone()),
        }
    }

    pub fn and_then<U>(&self, f: impl FnOnce(&T) -> Availability<U>) -> Availability<U> {
        match self {
            Self::Available(value) => f(value),
            Self::Unavailable { reason } => Availability::unavailable(reason.clone()),
        }
    }
}

/// Text shown wherever a value is missing
pub const UNAVAILABLE_TEXT: &str = "unavailable";

impl Availability<f64> {
    /// Format an amount with the given number of decimals, or the unavailable text
    #[must_use]
    pub fn format_mm(&self, decimals: usize) -> String {
        match self {
            Self::Available(amount) => format!("{amount:.decimals$}"),
            Self::Unavailable { .. } => UNAVAILABLE_TEXT.to_string(),
        }
    }
}

/// One forecast hour
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HourlyPrecipitation {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// Expected amount in mm
    pub amount_mm: f64,
    pub min_mm: Option<f64>,
    pub max_mm: Option<f64>,
    /// Upstream weather symbol code, e.g. `lightrain`
    pub symbol: Option<String>,
}

/// Precipitation expected during the next hours at a place
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PrecipitationForecast {
    /// Length of the requested window
    pub window_hours: u32,
    pub hourly: Vec<HourlyPrecipitation>,
    /// Total over the window in mm
    pub amount_mm: f64,
    pub rain_starts: Option<DateTime<Utc>>,
    pub rain_stops: Option<DateTime<Utc>>,
}

impl PrecipitationForecast {
    /// Derive the totals and rain interval from hourly steps
    #[must_use]
    pub fn from_hourly(window_hours: u32, hourly: Vec<HourlyPrecipitation>) -> Self {
        let amount_mm = hourly.iter().map(|h| h.amount_mm).sum();
        let mut wet = hourly.iter().filter(|h| h.amount_mm > 0.0);
        let first = wet.next();
        let rain_starts = first.map(|h| h.from);
        let rain_stops = wet.last().or(first).map(|h| h.to);

        Self {
            window_hours,
            hourly,
            amount_mm,
            rain_starts,
            rain_stops,
        }
    }

    #[must_use]
    pub fn hours_with_rain(&self) -> usize {
        self.hourly.iter().filter(|h| h.amount_mm > 0.0).count()
    }

    #[must_use]
    pub fn will_it_rain(&self) -> bool {
        self.rain_starts.is_some()
    }
}

/// A climate station known to the observation service
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Station {
    /// Source id such as `SN18700`
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub masl: Option<f64>,
}

/// A station together with its distance to the place it was looked up for
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NearbyStation {
    pub station: Station,
    pub distance_km: f64,
}

/// Amount measured by one station for one day
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StationReading {
    pub station: NearbyStation,
    /// Offset of the measuring day, e.g. `PT6H`
    pub time_offset: String,
    pub value_mm: f64,
}

/// Readings for one past day, closest station first
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DailyObservation {
    pub reference_date: NaiveDate,
    pub readings: Vec<StationReading>,
}

impl DailyObservation {
    /// The closest reporting station's amount
    #[must_use]
    pub fn amount(&self) -> Availability<f64> {
        match self.readings.first() {
            Some(reading) => Availability::Available(reading.value_mm),
            None => Availability::unavailable("no stations reporting nearby"),
        }
    }
}

/// Observed precipitation for the last days at a place
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlaceObservation {
    /// Most recent day first
    pub days: Vec<DailyObservation>,
}

impl PlaceObservation {
    /// Amount for the most recent day, i.e. the last 24 hours
    #[must_use]
    pub fn latest(&self) -> Availability<f64> {
        match self.days.first() {
            Some(day) => day.amount(),
            None => Availability::unavailable("no observation days requested"),
        }
    }
}
