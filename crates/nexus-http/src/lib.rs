//! HTTP server for Nexus Monitor.
//!
//! Exposes the session engine via REST and its events via WebSocket.

mod routes;
mod state;
mod websocket;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};

pub use routes::ApiError;
pub use state::SharedState;

/// Handle to a running HTTP server.
#[derive(Default)]
pub struct HttpServerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<std::thread::JoinHandle<()>>,
}

impl HttpServerHandle {
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }

    /// Stop the server gracefully.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.join();
        }
    }
}

/// Build the router with every route and a permissive CORS layer.
pub fn router(state: Arc<SharedState>) -> Router {
    Router::new()
        .route("/api/session/start", post(routes::start_session))
        .route("/api/session/update", put(routes::update_session))
        .route("/api/session/complete", post(routes::complete_session))
        .route("/api/session/{id}", get(routes::get_session))
        .route("/api/leaderboard", get(routes::get_leaderboard))
        .route("/api/analytics", get(routes::get_analytics))
        .route("/api/objectives", get(routes::get_objectives))
        .route("/api/health", get(routes::health))
        .route("/ws", get(websocket::ws_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve on an already bound `listener` until `shutdown` resolves.
pub async fn serve(
    state: Arc<SharedState>,
    listener: tokio::net::TcpListener,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Start the HTTP server on the given host and port.
///
/// The server runs in a separate thread with its own tokio runtime. Blocks
/// until the listener is bound, so a taken port is reported here rather than
/// only logged. Returns a handle that can be used to stop the server.
pub fn start(state: Arc<SharedState>, host: String, port: u16) -> Result<HttpServerHandle, String> {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel::<Result<(), String>>(1);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let task = std::thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => {
                let _ = ready_tx.send(Err(format!("Failed to create HTTP runtime: {}", e)));
                return;
            }
        };

        rt.block_on(async move {
            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => listener,
                Err(e) => {
                    let _ = ready_tx.send(Err(format!("Failed to bind HTTP server to {}: {}", addr, e)));
                    return;
                }
            };
            log::info!("HTTP server listening on http://{}", addr);
            let _ = ready_tx.send(Ok(()));

            let shutdown = async {
                shutdown_rx.await.ok();
                log::info!("HTTP server shutting down");
            };
            if let Err(e) = serve(state, listener, shutdown).await {
                log::error!("HTTP server on {} failed: {}", addr, e);
            }
        });
    });

    let ready = ready_rx
        .recv()
        .unwrap_or_else(|_| Err("HTTP server thread exited before binding".to_string()));
    if let Err(e) = ready {
        let _ = task.join();
        return Err(e);
    }

    Ok(HttpServerHandle {
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::EngineContext;

    #[test]
    fn http_server_handle_default() {
        let handle = HttpServerHandle::default();
        assert!(!handle.is_running());
    }

    #[test]
    fn invalid_address_is_rejected() {
        let state = Arc::new(SharedState::new(EngineContext::default()));
        let err = start(state, "not an address".to_string(), 80).err().unwrap();
        assert!(err.starts_with("Invalid address"));
    }

    #[test]
    fn taken_port_is_reported_by_start() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = occupied.local_addr().unwrap().port();

        let state = Arc::new(SharedState::new(EngineContext::default()));
        let err = start(state, "127.0.0.1".to_string(), port).err().unwrap();
        assert!(err.starts_with("Failed to bind"), "{err}");
    }

    #[test]
    fn server_starts_and_stops() {
        let state = Arc::new(SharedState::new(EngineContext::default()));

        let port = 19877;
        let mut handle = start(state, "127.0.0.1".to_string(), port).unwrap();
        assert!(handle.is_running());
        assert!(std::net::TcpStream::connect(("127.0.0.1", port)).is_ok());

        handle.stop();
        assert!(!handle.is_running());
    }
}
