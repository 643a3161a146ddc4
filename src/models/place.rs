//! Place model and the static places file

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{RainwatchError, Result};

/// A named location the app tracks
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Place {
    /// Display name, unique within the places file
    pub name: String,
    /// Latitude in decimal degrees
    #[serde(rename = "lat", alias = "latitude")]
    pub latitude: f64,
    /// Longitude in decimal degrees
    #[serde(rename = "lon", alias = "longitude")]
    pub longitude: f64,
    /// Height above sea level in metres
    #[serde(default, alias = "masl", skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

impl Place {
    /// Create a new place
    #[must_use]
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
            altitude: None,
        }
    }

    /// Format place as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }

    /// Check the name and coordinate ranges
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RainwatchError::validation("place name cannot be empty"));
        }
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(RainwatchError::validation(format!(
                "latitude {} of '{}' is outside -90..=90",
                self.latitude, self.name
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(RainwatchError::validation(format!(
                "longitude {} of '{}' is outside -180..=180",
                self.longitude, self.name
            )));
        }
        Ok(())
    }
}

/// Parse and validate the JSON contents of a places file
pub fn parse_places(json: &str) -> Result<Vec<Place>> {
    let places: Vec<Place> = serde_json::from_str(json)
        .map_err(|e| RainwatchError::validation(format!("malformed places file: {e}")))?;

    if places.is_empty() {
        return Err(RainwatchError::validation("places file lists no places"));
    }

    let mut seen = HashSet::new();
    for place in &places {
        place.validate()?;
        if !seen.insert(place.name.as_str()) {
            return Err(RainwatchError::validation(format!(
                "place '{}' is listed more than once",
                place.name
            )));
        }
    }
    Ok(places)
}

/// Load the places file once at startup
pub fn load_places(path: impl AsRef<Path>) -> Result<Vec<Place>> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|e| {
        RainwatchError::validation(format!("cannot read places file {}: {e}", path.display()))
    })?;
    let places = parse_places(&json)?;
    info!("Loaded {} places from {}", places.len(), path.display());
    Ok(places)
}
