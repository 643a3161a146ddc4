use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{error, warn};

use crate::RainwatchError;
use crate::models::Report;
use crate::render::{MapDocument, MapView, render_table};
use crate::web::AppState;

const MAX_ZOOM: u8 = 18;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(table_page))
        .route("/table", get(table_page))
        .route("/map", get(map_page))
}

/// Optional view override for the map page
#[derive(Debug, Default, Deserialize)]
pub struct MapQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub zoom: Option<u8>,
}

impl MapQuery {
    /// Apply the override on top of `default`
    pub fn view(&self, default: MapView) -> Result<MapView, RainwatchError> {
        let view = MapView {
            latitude: self.lat.unwrap_or(default.latitude),
            longitude: self.lon.unwrap_or(default.longitude),
            zoom: self.zoom.unwrap_or(default.zoom),
        };
        if !view.latitude.is_finite() || !(-90.0..=90.0).contains(&view.latitude) {
            return Err(RainwatchError::validation(format!(
                "Latitude must be between -90 and 90, got {}",
                view.latitude
            )));
        }
        if !view.longitude.is_finite() || !(-180.0..=180.0).contains(&view.longitude) {
            return Err(RainwatchError::validation(format!(
                "Longitude must be between -180 and 180, got {}",
                view.longitude
            )));
        }
        if view.zoom > MAX_ZOOM {
            return Err(RainwatchError::validation(format!(
                "Zoom must be at most {MAX_ZOOM}, got {}",
                view.zoom
            )));
        }
        Ok(view)
    }
}

/// Failure of a page handler
#[derive(Debug)]
pub struct PageError(RainwatchError);

impl From<RainwatchError> for PageError {
    fn from(e: RainwatchError) -> Self {
        Self(e)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RainwatchError::Validation { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Page failed: {}", self.0);
        }
        (status, self.0.user_message()).into_response()
    }
}

/// 502 when no upstream produced anything, the page is rendered regardless
fn page_status(report: &Report) -> StatusCode {
    if report.all_unavailable() {
        warn!("No upstream data for any place");
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::OK
    }
}

async fn table_page(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Html<String>), PageError> {
    let report = state.service.run(Utc::now()).await;
    let html = render_table(&report, &state.display)?;
    Ok((page_status(&report), Html(html)))
}

async fn map_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MapQuery>,
) -> Result<(StatusCode, Html<String>), PageError> {
    let view = query.view(state.display.view)?;

    let report = state.service.run(Utc::now()).await;
    let html = MapDocument::from_report(&report, &state.display)?
        .with_view(view)
        .render()?;
    Ok((page_status(&report), Html(html)))
}
