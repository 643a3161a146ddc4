use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    Router,
    http::{Method, StatusCode},
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::pages;
use crate::pipeline::PrecipitationService;
use crate::render::DisplaySettings;

/// Shared by every request
pub struct AppState {
    pub service: PrecipitationService,
    pub display: DisplaySettings,
}

/// The full application with its middleware stack
pub fn app(state: Arc<AppState>, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    pages::router().with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                request_timeout,
            ))
            .layer(cors),
    )
}

pub async fn run(config: &ServerConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.host, config.port))?;
    let app = app(state, config.request_timeout());

    if let Some(tls) = &config.tls {
        return serve_tls(addr, app, tls).await;
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Web server running at http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server failed")?;
    info!("Web server stopped");
    Ok(())
}

#[cfg(feature = "tls")]
async fn serve_tls(
    addr: SocketAddr,
    app: Router,
    tls: &crate::config::TlsConfig,
) -> anyhow::Result<()> {
    use axum_server::{Handle, tls_rustls::RustlsConfig};

    let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
        .await
        .with_context(|| {
            format!(
                "Failed to load TLS certificate {} / key {}",
                tls.cert_path.display(),
                tls.key_path.display()
            )
        })?;

    let handle = Handle::new();
    let shutdown = handle.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.graceful_shutdown(Some(Duration::from_secs(10)));
    });

    info!("Web server running at https://{}", addr);
    axum_server::bind_rustls(addr, rustls)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .context("Web server failed")?;
    info!("Web server stopped");
    Ok(())
}

#[cfg(not(feature = "tls"))]
async fn serve_tls(
    _addr: SocketAddr,
    _app: Router,
    _tls: &crate::config::TlsConfig,
) -> anyhow::Result<()> {
    anyhow::bail!("server.tls is configured but rainwatch was built without the `tls` feature")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
