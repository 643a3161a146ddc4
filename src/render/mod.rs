//! HTML output for the table and map pages

use askama::Template;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::config::DisplayConfig;
use crate::models::Place;
use crate::{RainwatchError, Result};

pub mod map;
pub mod table;

pub use map::{MapDocument, MapMarker, MapView, MarkerKind};
pub use table::render_table;

/// Time format used on every page
pub const TIME_OUT_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Presentation settings resolved once at startup
#[derive(Debug, Clone, PartialEq)]
pub struct DisplaySettings {
    pub timezone: Tz,
    /// Default map view
    pub view: MapView,
}

impl DisplaySettings {
    /// Resolve the timezone and the default map centre
    pub fn from_config(config: &DisplayConfig, places: &[Place]) -> Result<Self> {
        let timezone: Tz = config
            .timezone
            .parse()
            .map_err(|e| RainwatchError::config(format!("Invalid timezone: {e}")))?;

        let (latitude, longitude) = match (config.center_latitude, config.center_longitude) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => centroid(places),
        };

        Ok(Self {
            timezone,
            view: MapView {
                latitude,
                longitude,
                zoom: config.zoom,
            },
        })
    }

    /// Format a timestamp in the display timezone
    #[must_use]
    pub fn format_time(&self, time: DateTime<Utc>) -> String {
        time.with_timezone(&self.timezone)
            .format(TIME_OUT_FMT)
            .to_string()
    }
}

fn render_template<T: Template>(template: &T) -> Result<String> {
    template
        .render()
        .map_err(|e| RainwatchError::render(format!("Failed to render page: {e}")))
}

fn centroid(places: &[Place]) -> (f64, f64) {
    if places.is_empty() {
        return (0.0, 0.0);
    }
    let n = places.len() as f64;
    let lat = places.iter().map(|p| p.latitude).sum::<f64>() / n;
    let lon = places.iter().map(|p| p.longitude).sum::<f64>() / n;
    (lat, lon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_centre_defaults_to_centroid() {
        let places = [Place::new("A", 60.0, 10.0), Place::new("B", 62.0, 12.0)];
        let settings = DisplaySettings::from_config(&DisplayConfig::default(), &places).unwrap();
        assert_eq!((settings.view.latitude, settings.view.longitude), (61.0, 11.0));
        assert_eq!(settings.view.zoom, 11);
    }

    #[test]
    fn test_configured_centre_wins() {
        let config = DisplayConfig {
            center_latitude: Some(63.446827),
            center_longitude: Some(10.421906),
            ..DisplayConfig::default()
        };
        let settings = DisplaySettings::from_config(&config, &[]).unwrap();
        assert_eq!(settings.view.latitude, 63.446827);
    }

    #[test]
    fn test_format_time_in_oslo() {
        let settings = DisplaySettings::from_config(&DisplayConfig::default(), &[]).unwrap();
        let summer = Utc.with_ymd_and_hms(2019, 9, 4, 12, 22, 59).unwrap();
        assert_eq!(settings.format_time(summer), "2019-09-04 14:22:59");
    }
}
