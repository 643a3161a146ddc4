//! Map page: a self-contained Leaflet document with one marker per place and
//! one per contributing climate station.

use askama::Template;
use serde::Serialize;

use super::{DisplaySettings, render_template};
use crate::models::{Availability, CombinedRow, Report, StationSummary};
use crate::{RainwatchError, Result};

const MET_URL: &str = "https://www.met.no/en/free-meteorological-data/Licensing-and-crediting";

const RAIN_COLOR: &str = "red";
const DRY_COLOR: &str = "green";
const UNKNOWN_COLOR: &str = "gray";
const STATION_COLOR: &str = "#555555";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Place,
    Station,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub kind: MarkerKind,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub color: &'static str,
    /// Popup body, rendered HTML
    pub popup: String,
}

/// Centre and zoom of the initial view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapView {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapDocument {
    pub view: MapView,
    /// Report time in the display timezone
    pub updated: String,
    pub markers: Vec<MapMarker>,
}

#[derive(Template)]
#[template(path = "map.html")]
struct MapTemplate<'a> {
    view: &'a MapView,
    met_url: &'static str,
    updated: &'a str,
    markers_json: String,
}

/// One line of an amount list in a popup
struct AmountLine {
    label: String,
    available: bool,
    wet: bool,
    amount: String,
}

impl AmountLine {
    fn new(label: String, amount: &Availability<f64>) -> Self {
        match amount {
            Availability::Available(mm) => Self {
                label,
                available: true,
                wet: *mm > 0.0,
                amount: format!("{mm:.2}"),
            },
            Availability::Unavailable { .. } => Self {
                label,
                available: false,
                wet: false,
                amount: String::new(),
            },
        }
    }
}

#[derive(Template)]
#[template(path = "popups/place.html")]
struct PlacePopup<'a> {
    name: &'a str,
    coordinates: String,
    hours: u32,
    forecast_available: bool,
    amount: String,
    rain_starts: String,
    hours_with_rain: usize,
    observation_available: bool,
    days: Vec<AmountLine>,
}

struct DistanceLine<'a> {
    place: &'a str,
    km: String,
}

#[derive(Template)]
#[template(path = "popups/station.html")]
struct StationPopup<'a> {
    name: &'a str,
    days: Vec<AmountLine>,
    distances: Vec<DistanceLine<'a>>,
}

impl MapDocument {
    /// Build markers for every row and every station of the report
    pub fn from_report(report: &Report, settings: &DisplaySettings) -> Result<Self> {
        let mut markers = report
            .rows
            .iter()
            .map(|row| place_marker(row, report.forecast_hours, settings))
            .collect::<Result<Vec<_>>>()?;
        for summary in &report.stations {
            markers.push(station_marker(summary)?);
        }

        Ok(Self {
            view: settings.view,
            updated: settings.format_time(report.generated_at),
            markers,
        })
    }

    /// Replace the initial view
    #[must_use]
    pub fn with_view(mut self, view: MapView) -> Self {
        self.view = view;
        self
    }

    /// Render the Leaflet page
    pub fn render(&self) -> Result<String> {
        let markers_json = serde_json::to_string(&self.markers)
            .map_err(|e| RainwatchError::render(format!("Failed to serialize map data: {e}")))?
            // inline <script> must not see a closing tag
            .replace("</", "<\\/");

        render_template(&MapTemplate {
            view: &self.view,
            met_url: MET_URL,
            updated: &self.updated,
            markers_json,
        })
    }
}

fn place_marker(row: &CombinedRow, hours: u32, settings: &DisplaySettings) -> Result<MapMarker> {
    let mut popup = PlacePopup {
        name: &row.place.name,
        coordinates: row.place.format_coordinates(),
        hours,
        forecast_available: false,
        amount: String::new(),
        rain_starts: String::new(),
        hours_with_rain: 0,
        observation_available: false,
        days: Vec::new(),
    };

    let color = match &row.forecast {
        Availability::Available(forecast) => {
            popup.forecast_available = true;
            popup.amount = format!("{:.2}", forecast.amount_mm);
            popup.rain_starts = forecast
                .rain_starts
                .map(|t| settings.format_time(t))
                .unwrap_or_default();
            popup.hours_with_rain = forecast.hours_with_rain();
            if forecast.will_it_rain() {
                RAIN_COLOR
            } else {
                DRY_COLOR
            }
        }
        Availability::Unavailable { .. } => UNKNOWN_COLOR,
    };

    if let Availability::Available(observation) = &row.observation {
        popup.observation_available = true;
        popup.days = observation
            .days
            .iter()
            .map(|day| AmountLine::new(day.reference_date.to_string(), &day.amount()))
            .collect();
    }

    Ok(MapMarker {
        kind: MarkerKind::Place,
        name: row.place.name.clone(),
        latitude: row.place.latitude,
        longitude: row.place.longitude,
        color,
        popup: render_template(&popup)?,
    })
}

fn station_marker(summary: &StationSummary) -> Result<MapMarker> {
    let station = &summary.station;
    let popup = StationPopup {
        name: &station.name,
        days: summary
            .values
            .iter()
            .rev()
            .map(|(date, mm)| AmountLine::new(date.to_string(), &Availability::Available(*mm)))
            .collect(),
        distances: summary
            .distances
            .iter()
            .map(|(place, km)| DistanceLine {
                place,
                km: format!("{km:.2}"),
            })
            .collect(),
    };

    Ok(MapMarker {
        kind: MarkerKind::Station,
        name: station.id.clone(),
        latitude: station.latitude,
        longitude: station.longitude,
        color: STATION_COLOR,
        popup: render_template(&popup)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{combine, group_by_station};
    use crate::config::DisplayConfig;
    use crate::models::{
        DailyObservation, NearbyStation, Place, PlaceObservation, PrecipitationForecast, Station,
        StationReading, UNAVAILABLE_TEXT,
    };
    use chrono::{NaiveDate, TimeZone, Utc};

    fn forecast(amount_mm: f64) -> Availability<PrecipitationForecast> {
        let starts = Utc.with_ymd_and_hms(2019, 9, 4, 13, 0, 0).unwrap();
        Availability::Available(PrecipitationForecast {
            window_hours: 6,
            hourly: vec![],
            amount_mm,
            rain_starts: (amount_mm > 0.0).then_some(starts),
            rain_stops: None,
        })
    }

    fn observed(value_mm: f64) -> Availability<PlaceObservation> {
        Availability::Available(PlaceObservation {
            days: vec![DailyObservation {
                reference_date: NaiveDate::from_ymd_opt(2019, 9, 3).unwrap(),
                readings: vec![StationReading {
                    station: NearbyStation {
                        station: Station {
                            id: "SN18700".to_string(),
                            name: "OSLO - BLINDERN".to_string(),
                            latitude: 59.94,
                            longitude: 10.72,
                            masl: None,
                        },
                        distance_km: 4.5,
                    },
                    time_offset: "PT6H".to_string(),
                    value_mm,
                }],
            }],
        })
    }

    fn report() -> Report {
        let rows = vec![
            combine(&Place::new("Oslo", 59.9, 10.7), forecast(2.3), observed(0.1)),
            combine(
                &Place::new("Bergen", 60.39, 5.32),
                forecast(0.0),
                Availability::unavailable("missing credential"),
            ),
            combine(
                &Place::new("Tromsø", 69.65, 18.96),
                Availability::unavailable("timeout"),
                Availability::unavailable("missing credential"),
            ),
        ];
        let stations = group_by_station(&rows);
        Report {
            generated_at: Utc.with_ymd_and_hms(2019, 9, 4, 12, 22, 59).unwrap(),
            forecast_hours: 6,
            rows,
            stations,
        }
    }

    fn settings() -> DisplaySettings {
        DisplaySettings::from_config(&DisplayConfig::default(), &[]).unwrap()
    }

    #[test]
    fn test_one_marker_per_place_at_configured_coordinates() {
        let report = report();
        let doc = MapDocument::from_report(&report, &settings()).unwrap();

        let places: Vec<&MapMarker> = doc
            .markers
            .iter()
            .filter(|m| m.kind == MarkerKind::Place)
            .collect();
        assert_eq!(places.len(), report.rows.len());
        for (marker, row) in places.iter().zip(&report.rows) {
            assert_eq!(marker.name, row.place.name);
            assert_eq!(marker.latitude, row.place.latitude);
            assert_eq!(marker.longitude, row.place.longitude);
        }
        assert_eq!(doc.markers.len(), report.rows.len() + 1);
        assert_eq!(doc.markers[3].kind, MarkerKind::Station);
    }

    #[test]
    fn test_popup_contains_both_values() {
        let doc = MapDocument::from_report(&report(), &settings()).unwrap();
        let oslo = &doc.markers[0];

        assert!(oslo.popup.contains("2.30 mm"));
        assert!(oslo.popup.contains("0.10 mm"));
        assert!(oslo.popup.contains("Start of rain: 2019-09-04 15:00:00"));
        assert!(oslo.popup.contains("59.9000, 10.7000"));
        assert_eq!(oslo.color, RAIN_COLOR);
    }

    #[test]
    fn test_marker_colors() {
        let doc = MapDocument::from_report(&report(), &settings()).unwrap();
        assert_eq!(doc.markers[1].color, DRY_COLOR);
        assert_eq!(doc.markers[2].color, UNKNOWN_COLOR);
        assert!(doc.markers[2].popup.contains(UNAVAILABLE_TEXT));
    }

    #[test]
    fn test_station_popup() {
        let doc = MapDocument::from_report(&report(), &settings()).unwrap();
        let station = &doc.markers[3];
        assert!(station.popup.starts_with("OSLO - BLINDERN<ul>"));
        assert!(station.popup.contains("<li>2019-09-03: <font color=\"red\"><b>0.10 mm</b></font></li>"));
        assert!(station.popup.contains("<li>Oslo: 4.50 km</li>"));
    }

    #[test]
    fn test_render_embeds_view_and_markers() {
        let doc = MapDocument::from_report(&report(), &settings())
            .unwrap()
            .with_view(MapView {
                latitude: 59.9,
                longitude: 10.7,
                zoom: 14,
            });
        let html = doc.render().unwrap();

        assert!(html.contains("center: [59.9, 10.7], zoom: 14"));
        assert!(html.contains(r#""name":"Oslo""#));
        assert!(html.contains("updated at: 2019-09-04 14:22:59"));
        assert!(html.contains(&format!(r#"<a href="{MET_URL}">Weather information</a>"#)));
    }

    #[test]
    fn test_render_escapes_script_end() {
        let mut report = report();
        report.rows[0].place.name = "</script><script>alert(1)".to_string();
        let html = MapDocument::from_report(&report, &settings())
            .unwrap()
            .render()
            .unwrap();
        assert_eq!(html.matches("</script>").count(), 3);
        assert!(html.contains("&lt;/script&gt;"));
    }

    #[test]
    fn test_popup_names_are_escaped() {
        let mut report = report();
        report.rows[0].place.name = "Ås & <Vestby>".to_string();
        let doc = MapDocument::from_report(&report, &settings()).unwrap();
        assert!(doc.markers[0].popup.starts_with("<b>Ås &amp; &lt;Vestby&gt;</b>"));
        assert_eq!(doc.markers[0].name, "Ås & <Vestby>");
    }
}
