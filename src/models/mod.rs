//! Data models for `rainwatch`
//!
//! - Place: named coordinates from the static places file
//! - Precipitation: forecast and observation values with the unavailable marker
//! - Report: combined rows and grouped stations, the unit the pages render

pub mod place;
pub mod precipitation;
pub mod report;

pub use place::{Place, load_places, parse_places};
pub use precipitation::{
    Availability, DailyObservation, HourlyPrecipitation, NearbyStation, PlaceObservation,
    PrecipitationForecast, Station, StationReading, UNAVAILABLE_TEXT,
};
pub use report::{CombinedRow, Report, StationSummary};
