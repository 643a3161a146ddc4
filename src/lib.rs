//! Rainwatch - precipitation forecast and observation pages for a fixed list
//! of places.
//!
//! Forecasts come from the MET Norway Locationforecast API, observations from
//! the Frost API. Both are merged per place and served as an HTML table and a
//! Leaflet map.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod pages;
pub mod pipeline;
pub mod render;
pub mod weather;
pub mod web;

// Re-export core types for public API
pub use config::RainwatchConfig;
pub use error::RainwatchError;
pub use models::{Availability, CombinedRow, Place, Report};
pub use pipeline::PrecipitationService;
pub use render::{DisplaySettings, MapDocument, render_table};
pub use weather::{FrostClient, MetNorwayClient};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, RainwatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
