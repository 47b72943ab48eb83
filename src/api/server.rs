use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::Router;
use axum::extract::MatchedPath;
use axum::routing::get;
use http::StatusCode;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::instrument;

/// Liveness routes; the process answering at all is the signal
pub fn router() -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method();
                let uri = req.uri();

                let matched_path = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|matched| matched.as_str());

                tracing::debug_span!("health_request", ?method, ?uri, ?matched_path)
            }),
        )
}

async fn health() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

#[instrument(skip(listener, app, tx))]
async fn serve(listener: TcpListener, app: Router, tx: UnboundedSender<SocketAddr>) {
    match listener.local_addr() {
        Ok(addr) => {
            _ = tx.send(addr);
        }
        Err(e) => tracing::warn!(error = ?e, "bound address unavailable"),
    }

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = ?e, "health server stopped");
    }
}

/// Binds `0.0.0.0:port` and spawns the server plus a task that logs once it is listening.
#[instrument]
pub async fn start_server(port: u16) -> Result<Vec<JoinHandle<()>>, RouteError> {
    tracing::info!("starting health server");

    let socket_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
    let listener = TcpListener::bind(socket_addr)
        .await
        .map_err(|source| RouteError::Bind { addr: socket_addr, source })?;

    let (tx, mut rx) = mpsc::unbounded_channel::<SocketAddr>();
    let server_handle = tokio::spawn(serve(listener, router(), tx));

    let logging_handle = tokio::spawn(async move {
        if let Some(addr) = rx.recv().await {
            tracing::info!(
                server_url = &format!("http://127.0.0.1:{}", addr.port()),
                "server ready"
            );
        }
    });

    Ok(vec![server_handle, logging_handle])
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("failed to bind health server to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
}
