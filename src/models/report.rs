//! Combined rows and the report rendered by the pages

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

use super::place::Place;
use super::precipitation::{Availability, PlaceObservation, PrecipitationForecast, Station};

/// Forecast and observation for one place; one table row and one map marker
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedRow {
    pub place: Place,
    pub forecast: Availability<PrecipitationForecast>,
    pub observation: Availability<PlaceObservation>,
}

impl CombinedRow {
    /// Total forecast amount for the window
    #[must_use]
    pub fn forecast_amount(&self) -> Availability<f64> {
        self.forecast.map(|f| f.amount_mm)
    }

    /// Observed amount for the last 24 hours
    #[must_use]
    pub fn observed_amount(&self) -> Availability<f64> {
        self.observation.and_then(PlaceObservation::latest)
    }

    /// `true` when neither upstream produced anything for this place
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.forecast.is_available() && !self.observed_amount().is_available()
    }

    /// One-line summary, e.g. `Oslo | forecast=2.3mm | observed=0.1mm`
    #[must_use]
    pub fn summary_line(&self) -> String {
        format!(
            "{} | forecast={} | observed={}",
            self.place.name,
            with_unit(&self.forecast_amount()),
            with_unit(&self.observed_amount()),
        )
    }
}

fn with_unit(amount: &Availability<f64>) -> String {
    match amount {
        Availability::Available(mm) => format!("{mm:.1}mm"),
        Availability::Unavailable { .. } => amount.format_mm(1),
    }
}

/// A station that contributed readings, grouped across places
#[derive(Debug, Clone, PartialEq)]
pub struct StationSummary {
    pub station: Station,
    pub values: BTreeMap<NaiveDate, f64>,
    pub offsets: BTreeMap<NaiveDate, String>,
    /// Distance in km to every place this station reported for
    pub distances: BTreeMap<String, f64>,
}

/// Everything one page load shows
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub forecast_hours: u32,
    /// One row per configured place, in configuration order
    pub rows: Vec<CombinedRow>,
    /// Sorted by station id
    pub stations: Vec<StationSummary>,
}

impl Report {
    /// `true` when every upstream call failed for every place
    #[must_use]
    pub fn all_unavailable(&self) -> bool {
        !self.rows.is_empty() && self.rows.iter().all(CombinedRow::is_empty)
    }
}
