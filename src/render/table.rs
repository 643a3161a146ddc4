//! Table page: one row per place

use askama::Template;

use super::{DisplaySettings, render_template};
use crate::Result;
use crate::models::{Availability, CombinedRow, Report, UNAVAILABLE_TEXT};

const HEADERS: [&str; 5] = [
    "Location",
    "Precipitation (mm)",
    "Start of rain",
    "Hours with rain",
    "Observed last 24h (mm)",
];

/// Zoom used when jumping from a table row to the map
const ROW_ZOOM: u8 = 14;

#[derive(Template)]
#[template(path = "table.html")]
struct TableTemplate<'a> {
    hours: u32,
    updated: String,
    headers: &'a [&'a str],
    rows: Vec<TableRow<'a>>,
}

struct TableRow<'a> {
    name: &'a str,
    map_url: String,
    cells: Vec<Cell>,
}

struct Cell {
    class: &'static str,
    /// Hover text, the failure reason for unavailable cells
    title: String,
    text: String,
}

impl Cell {
    fn number(text: String) -> Self {
        Self {
            class: "number",
            title: String::new(),
            text,
        }
    }

    fn unavailable(reason: &str) -> Self {
        Self {
            class: "unavailable",
            title: reason.to_string(),
            text: UNAVAILABLE_TEXT.to_string(),
        }
    }
}

/// Render the full table page. The output depends only on the arguments.
pub fn render_table(report: &Report, settings: &DisplaySettings) -> Result<String> {
    render_template(&TableTemplate {
        hours: report.forecast_hours,
        updated: settings.format_time(report.generated_at),
        headers: &HEADERS,
        rows: report
            .rows
            .iter()
            .map(|row| table_row(row, settings))
            .collect(),
    })
}

fn table_row<'a>(row: &'a CombinedRow, settings: &DisplaySettings) -> TableRow<'a> {
    let place = &row.place;
    let mut cells = match &row.forecast {
        Availability::Available(forecast) => vec![
            Cell::number(format!("{:.2}", forecast.amount_mm)),
            Cell {
                class: "",
                title: String::new(),
                text: forecast
                    .rain_starts
                    .map(|t| settings.format_time(t))
                    .unwrap_or_default(),
            },
            Cell::number(forecast.hours_with_rain().to_string()),
        ],
        Availability::Unavailable { reason } => {
            (0..3).map(|_| Cell::unavailable(reason)).collect()
        }
    };

    cells.push(match row.observed_amount() {
        Availability::Available(mm) => Cell::number(format!("{mm:.2}")),
        Availability::Unavailable { reason } => Cell::unavailable(&reason),
    });

    TableRow {
        name: &place.name,
        map_url: format!(
            "map?lat={}&lon={}&zoom={}",
            place.latitude, place.longitude, ROW_ZOOM
        ),
        cells,
    }
}
