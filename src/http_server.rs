use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use std::{net::SocketAddr, sync::Arc, time::SystemTime};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

use crate::{config_reload::ReloadCoordinator, metrics::DnsMetrics, zone::ZoneDefinition};

/// HTTP API: zone reload, health, statistics and metrics export
pub struct HttpServer {
    coordinator: Arc<ReloadCoordinator>,
    metrics: Arc<DnsMetrics>,
    bind_addr: SocketAddr,
}

impl HttpServer {
    pub fn new(
        coordinator: Arc<ReloadCoordinator>,
        metrics: Arc<DnsMetrics>,
        bind_addr: SocketAddr,
    ) -> Self {
        Self {
            coordinator,
            metrics,
            bind_addr,
        }
    }

    /// Bind the configured address and serve until shutdown is signalled
    pub async fn start(
        self,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        self.serve(listener, shutdown_rx).await
    }

    /// Serve on an already bound listener
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let app = self.router();
        info!("Starting HTTP server on {}", listener.local_addr()?);

        let shutdown_signal = async move {
            let _ = shutdown_rx.recv().await;
            info!("HTTP server received shutdown signal");
        };

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await?;

        Ok(())
    }

    pub fn router(&self) -> Router {
        let app_state = AppState {
            coordinator: self.coordinator.clone(),
            metrics: self.metrics.clone(),
            startup_time: SystemTime::now(),
        };

        Router::new()
            .route("/api/reload", post(reload_zones))
            .route("/health", get(health_check))
            .route("/stats", get(server_stats))
            .route("/metrics", get(prometheus_metrics))
            .with_state(app_state)
            .layer(CorsLayer::permissive())
    }
}

#[derive(Clone)]
struct AppState {
    coordinator: Arc<ReloadCoordinator>,
    metrics: Arc<DnsMetrics>,
    startup_time: SystemTime,
}

fn error_response(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(json!({
            "status": "error",
            "message": message
        })),
    )
        .into_response()
}

/// Zone reload endpoint. The body is a JSON zone definition.
async fn reload_zones(State(state): State<AppState>, body: String) -> Response {
    let definition: ZoneDefinition = match serde_json::from_str(&body) {
        Ok(definition) => definition,
        Err(e) => {
            warn!("Rejected reload request with undecodable body: {}", e);
            state.metrics.record_reload(false);
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Failed to decode zone definition: {}", e),
            );
        }
    };

    let coordinator = state.coordinator.clone();
    let result = tokio::task::spawn_blocking(move || coordinator.apply(&definition)).await;

    match result {
        Ok(Ok(summary)) => {
            info!("Zones reloaded via HTTP endpoint");
            let mut body = json!({ "status": "success" });
            if let (Some(fields), Ok(serde_json::Value::Object(summary))) =
                (body.as_object_mut(), serde_json::to_value(&summary))
            {
                fields.extend(summary);
            }
            (StatusCode::OK, Json(body)).into_response()
        }
        Ok(Err(e)) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        Err(e) => {
            error!("Zone reload task failed: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Zone reload task failed".to_string(),
            )
        }
    }
}

/// Basic health check endpoint
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "healthy"})))
}

/// Snapshot and query statistics
async fn server_stats(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.coordinator.store();
    let snapshot = store.current();

    Json(json!({
        "server": {
            "name": "dns-workbench",
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_seconds": SystemTime::now()
                .duration_since(state.startup_time)
                .unwrap_or_default()
                .as_secs()
        },
        "snapshot": {
            "generation": store.generation(),
            "serial": snapshot.serial(),
            "built_at": snapshot.built_at().to_rfc3339(),
            "zones": snapshot.zones().iter().map(|zone| zone.to_string()).collect::<Vec<_>>(),
            "names": snapshot.name_count(),
            "records": snapshot.record_count()
        },
        "queries": state.metrics.queries_by_outcome(),
        "reloads": {
            "success": state.metrics.reload_count(true),
            "failure": state.metrics.reload_count(false)
        }
    }))
}

/// Prometheus metrics endpoint
async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    match state.metrics.export() {
        Ok(metrics) => {
            debug!("Exported {} bytes of metrics", metrics.len());
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
                metrics,
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to export metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to export metrics".to_string(),
            )
                .into_response()
        }
    }
}
