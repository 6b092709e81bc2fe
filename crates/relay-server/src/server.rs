//! `RelayServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Path, State};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use relay_core::ConnectionId;
use tokio::net::TcpListener;
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::bus::ChannelBus;
use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::router::MessageRouter;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::session::{self, SessionContext};

/// Issues ids for new player connections.
pub type IdSource = fn() -> relay_core::Result<ConnectionId>;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Everything a socket session needs.
    pub session: SessionContext,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle, if a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// Player id issuer.
    pub issue_id: IdSource,
}

/// The relay server.
pub struct RelayServer {
    config: Arc<ServerConfig>,
    router: Arc<MessageRouter>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
    issue_id: IdSource,
}

impl RelayServer {
    /// Create a server around the relay's half of the bus.
    pub fn new(config: ServerConfig, bus: ChannelBus) -> Self {
        Self {
            config: Arc::new(config),
            router: Arc::new(MessageRouter::new(bus)),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics: None,
            issue_id: ConnectionId::generate,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Issue player ids from `source` instead of the OS randomness source.
    #[must_use]
    pub fn with_id_source(mut self, source: IdSource) -> Self {
        self.issue_id = source;
        self
    }

    /// Build the Axum router with all routes.
    pub fn app(&self) -> axum::Router {
        let state = AppState {
            session: SessionContext {
                router: Arc::clone(&self.router),
                shutdown: self.shutdown.token(),
                send_queue_size: self.config.send_queue_size,
            },
            config: Arc::clone(&self.config),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
            issue_id: self.issue_id,
        };

        axum::Router::new()
            .route("/host", get(host_handler))
            .route("/join/{token}", get(join_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route_service("/", ServeFile::new(self.config.host_page()))
            .nest_service("/build", ServeDir::new(&self.config.static_dir))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind, start the outbound subscribers, and serve in the background.
    ///
    /// Returns the bound address. Every spawned task is tracked by the
    /// shutdown coordinator.
    pub async fn listen(&self) -> std::io::Result<SocketAddr> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;

        for handle in self.router.spawn_subscribers(&self.shutdown.token()) {
            self.shutdown.track(handle);
        }

        let app = self.app();
        let token = self.shutdown.token();
        self.shutdown.track(tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = served {
                error!(error = %e, "server stopped with error");
            }
        }));

        info!(%addr, "relay listening");
        Ok(addr)
    }

    /// Stop serving and wait for tracked tasks plus `extra`, bounded by the
    /// configured shutdown timeout.
    pub async fn shutdown_gracefully(&self, extra: Vec<tokio::task::JoinHandle<()>>) {
        self.shutdown
            .graceful_shutdown(extra, Some(self.config.shutdown_timeout))
            .await;
    }

    /// Routing state.
    pub fn message_router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }
}

/// GET /host
async fn host_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let ctx = state.session;
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| session::run_host_session(socket, ctx))
}

/// GET /join/{token}
///
/// Upgrades to a player socket. Without upgrade headers, serves the player page.
async fn join_handler(
    Path(session_token): Path<String>,
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Ok(ws) = upgrade else {
        return serve_page(state.config.player_page()).await;
    };

    let id = match (state.issue_id)() {
        Ok(id) => id,
        Err(e) => {
            error!(error = %e, "cannot issue a player id, refusing connection");
            return (StatusCode::SERVICE_UNAVAILABLE, "player ids unavailable").into_response();
        }
    };

    let ctx = state.session;
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| session::run_player_session(socket, id, session_token, ctx))
}

async fn serve_page(path: PathBuf) -> Response {
    match ServeFile::new(path).oneshot(Request::new(Body::empty())).await {
        Ok(resp) => resp.into_response(),
        Err(never) => match never {},
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let router = &state.session.router;
    let hosts = router.hosts().len().await;
    let players = router.players().len();
    Json(health::health_check(state.start_time, hosts, players))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::ChannelBusBuilder;
    use metrics_exporter_prometheus::PrometheusBuilder;

    fn make_server(static_dir: &std::path::Path) -> RelayServer {
        let (bus, _core) = ChannelBusBuilder::new(8).build();
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            static_dir: static_dir.to_path_buf(),
            ..ServerConfig::default()
        };
        RelayServer::new(config, bus)
    }

    fn static_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("host.html"), "<h1>host</h1>").unwrap();
        std::fs::write(dir.path().join("player.html"), "<h1>player</h1>").unwrap();
        std::fs::write(dir.path().join("app.js"), "console.log(1)").unwrap();
        dir
    }

    async fn fetch(app: axum::Router, uri: &str) -> (StatusCode, String) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn health_reports_counts() {
        let dir = static_dir();
        let (status, body) = fetch(make_server(dir.path()).app(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["hosts"], 0);
        assert_eq!(parsed["players"], 0);
    }

    #[tokio::test]
    async fn root_serves_host_page() {
        let dir = static_dir();
        let (status, body) = fetch(make_server(dir.path()).app(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<h1>host</h1>");
    }

    #[tokio::test]
    async fn join_without_upgrade_serves_player_page() {
        let dir = static_dir();
        let (status, body) = fetch(make_server(dir.path()).app(), "/join/abc123").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<h1>player</h1>");
    }

    #[tokio::test]
    async fn build_serves_assets() {
        let dir = static_dir();
        let (status, body) = fetch(make_server(dir.path()).app(), "/build/app.js").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "console.log(1)");
    }

    #[tokio::test]
    async fn host_without_upgrade_is_rejected() {
        let dir = static_dir();
        let (status, _) = fetch(make_server(dir.path()).app(), "/host").await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn metrics_absent_without_recorder() {
        let dir = static_dir();
        let (status, _) = fetch(make_server(dir.path()).app(), "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_rendered_with_recorder() {
        let dir = static_dir();
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let server = make_server(dir.path()).with_metrics(handle);
        let (status, _) = fetch(server.app(), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let dir = static_dir();
        let (status, _) = fetch(make_server(dir.path()).app(), "/nonexistent").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listen_binds_and_shuts_down() {
        let dir = static_dir();
        let server = make_server(dir.path());
        let addr = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);
        assert!(server.shutdown().tracked_count() >= 1);

        server.shutdown_gracefully(Vec::new()).await;
        assert!(server.shutdown().is_shutting_down());
        assert_eq!(server.shutdown().tracked_count(), 0);
    }
}
