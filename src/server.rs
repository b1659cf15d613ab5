//! HTTP surface: start a batch, poll its progress, download the report.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    config::Config,
    driver::DriverFactory,
    progress::{JobProgress, ProgressStore, StartError},
    runner::BatchRunner,
    util::{parse_plates, stamp_compact},
};

const INDEX_HTML: &str = include_str!("../assets/index.html");
const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid listen address `{address}`: {source}")]
    InvalidListenAddr {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("axum server error: {source}")]
    Serve {
        #[source]
        source: std::io::Error,
    },
}

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub progress: ProgressStore,
    pub drivers: DriverFactory,
}

impl AppState {
    pub fn new(cfg: Config, progress: ProgressStore, drivers: DriverFactory) -> Self {
        Self {
            cfg: Arc::new(cfg),
            progress,
            drivers,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StartRequest {
    #[serde(default)]
    placas: String,
}

#[derive(Debug, Serialize)]
struct StartResponse {
    success: bool,
    mensaje: &'static str,
    total_placas: usize,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/iniciar_proceso", post(start_job))
        .route("/progreso", get(poll_progress))
        .route("/descargar_excel", get(download_report))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, host: &str, port: u16) -> Result<(), ServerError> {
    let address = format!("{host}:{port}");
    let addr: SocketAddr = address
        .parse()
        .map_err(|source| ServerError::InvalidListenAddr {
            address: address.clone(),
            source,
        })?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            address: address.clone(),
            source,
        })?;
    info!(%addr, "simit-check listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(wait_for_shutdown())
        .await
        .map_err(|source| ServerError::Serve { source })?;

    info!("server shutdown complete");
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

async fn start_job(
    State(state): State<AppState>,
    body: Result<Json<StartRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, format!("Error: {rejection}"));
        }
    };

    let plates = parse_plates(&request.placas);
    if plates.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "No valid plates were entered");
    }

    if let Err(StartError::AlreadyRunning) = state.progress.try_begin(plates.len()) {
        return error_response(StatusCode::BAD_REQUEST, "A process is already running");
    }

    let total = plates.len();
    let runner = BatchRunner::new(&state.cfg, (state.drivers)(), state.progress.clone());
    runner.spawn(plates);
    info!(total, "batch job accepted");

    (
        StatusCode::ACCEPTED,
        Json(StartResponse {
            success: true,
            mensaje: "Process started",
            total_placas: total,
        }),
    )
        .into_response()
}

async fn poll_progress(State(state): State<AppState>) -> Json<JobProgress> {
    Json(state.progress.snapshot())
}

async fn download_report(State(state): State<AppState>) -> Response {
    let Some(path) = state.progress.report_path() else {
        return error_response(StatusCode::NOT_FOUND, "No report available");
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let disposition = format!("attachment; filename=\"simit_report_{}.xlsx\"", stamp_compact());
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, XLSX_MIME.to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                bytes,
            )
                .into_response()
        }
        Err(err) => {
            warn!(path = %path.display(), "report unavailable: {err}");
            error_response(StatusCode::NOT_FOUND, "No report available")
        }
    }
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "failed to capture Ctrl+C signal");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(error) => {
                warn!(%error, "failed to capture SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = sigterm => {},
    }
    info!("shutdown signal received");
}
