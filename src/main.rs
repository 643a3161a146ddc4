use std::sync::Arc;

use anyhow::Context;
use rainwatch::config::RainwatchConfig;
use rainwatch::models::load_places;
use rainwatch::render::DisplaySettings;
use rainwatch::weather::{FrostClient, MetNorwayClient};
use rainwatch::web::{self, AppState};
use rainwatch::{PrecipitationService, logging};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RainwatchConfig::load().context("Failed to load configuration")?;
    logging::init(&config.logging)?;
    info!("rainwatch {} starting", rainwatch::VERSION);

    let places = load_places(&config.places.file)
        .with_context(|| format!("Failed to load places from {}", config.places.file.display()))?;
    let display = DisplaySettings::from_config(&config.display, &places)?;

    let forecasts = Arc::new(MetNorwayClient::new(&config.forecast)?);
    let observations = Arc::new(FrostClient::new(&config.observation)?);
    if !observations.has_credential() {
        warn!(
            "{} is not set, observations will be shown as unavailable",
            rainwatch::config::CREDENTIAL_VAR
        );
    }

    let service = PrecipitationService::new(
        places,
        forecasts,
        observations.clone(),
        config.forecast.hours,
    )
    .with_call_timeout(config.server.upstream_budget());

    observations.warm_up(service.places()).await;

    web::run(&config.server, Arc::new(AppState { service, display })).await
}
