//! HTTP and WebSocket server implementation

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::{future, SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::error::{RpcError, RpcResult};
use crate::handler::{HandlerConfig, RpcHandler};
use crate::session::serve_connection;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen address, also accepting WebSocket upgrades
    pub listen_addr: SocketAddr,
    /// Dedicated WebSocket listener, if different from the HTTP one
    pub ws_addr: Option<SocketAddr>,
    /// Unix socket path for IPC
    pub ipc_path: Option<PathBuf>,
    /// Maximum request body size (default: 10MB)
    pub max_body_size: usize,
    /// Request timeout (default: 30s)
    pub request_timeout: Duration,
    /// Enable CORS (default: true)
    pub enable_cors: bool,
    /// Largest accepted batch (default: 50)
    pub max_batch_size: usize,
    /// Outbound messages buffered per connection (default: 1024)
    pub connection_queue_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8545)),
            ws_addr: None,
            ipc_path: None,
            max_body_size: 10 * 1024 * 1024,
            request_timeout: Duration::from_secs(30),
            enable_cors: true,
            max_batch_size: 50,
            connection_queue_size: 1024,
        }
    }
}

impl ServerConfig {
    /// Create a new server config with the given address
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }

    /// Router limits derived from this configuration
    pub fn handler_config(&self) -> HandlerConfig {
        HandlerConfig {
            max_batch_size: self.max_batch_size,
            request_timeout: Some(self.request_timeout),
        }
    }
}

/// RPC server state
pub struct ServerState {
    /// RPC handler for processing requests
    pub handler: RpcHandler,
    /// Outbound queue size per WebSocket connection
    pub queue_size: usize,
}

/// RPC server: HTTP, WebSocket and optionally IPC
pub struct RpcServer {
    config: ServerConfig,
    state: Arc<ServerState>,
}

impl RpcServer {
    /// Create a new RPC server
    pub fn new(config: ServerConfig, handler: RpcHandler) -> Self {
        let state = Arc::new(ServerState {
            handler,
            queue_size: config.connection_queue_size,
        });
        Self { config, state }
    }

    /// HTTP routes plus WebSocket upgrades on `/` and `/ws`
    pub fn router(&self) -> Router {
        let router = Router::new()
            .route("/", post(handle_rpc).get(handle_ws))
            .route("/ws", get(handle_ws))
            .route("/health", get(health));
        self.finish(router)
    }

    /// Routes for a dedicated WebSocket listener
    pub fn ws_router(&self) -> Router {
        let router = Router::new()
            .route("/", get(handle_ws))
            .route("/ws", get(handle_ws));
        self.finish(router)
    }

    fn finish(&self, router: Router<Arc<ServerState>>) -> Router {
        let mut router = router.layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(self.config.max_body_size)),
        );

        if self.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        router.with_state(self.state.clone())
    }

    /// Run every configured listener until one of them fails
    pub async fn run(self) -> RpcResult<()> {
        let background = self.state.handler.context().spawn_background_tasks();
        let mut listeners = Vec::new();

        let listener = TcpListener::bind(self.config.listen_addr).await?;
        tracing::info!("RPC server listening on {}", self.config.listen_addr);
        listeners.push(tokio::spawn(serve_http(listener, self.router())));

        if let Some(ws_addr) = self.config.ws_addr.filter(|a| *a != self.config.listen_addr) {
            let listener = TcpListener::bind(ws_addr).await?;
            tracing::info!("WebSocket server listening on {}", ws_addr);
            listeners.push(tokio::spawn(serve_http(listener, self.ws_router())));
        }

        #[cfg(unix)]
        if let Some(path) = &self.config.ipc_path {
            let listener = crate::ipc::bind(path)?;
            tracing::info!("IPC server listening on {}", path.display());
            listeners.push(tokio::spawn(crate::ipc::serve(
                listener,
                self.state.handler.clone(),
                self.config.connection_queue_size,
                self.config.max_body_size,
            )));
        }

        let (finished, _, rest) = future::select_all(listeners).await;
        for task in rest {
            task.abort();
        }
        for task in background {
            task.abort();
        }
        finished.map_err(|e| RpcError::Transport(e.to_string()))?
    }

    /// Get the server listen address
    pub fn listen_addr(&self) -> SocketAddr {
        self.config.listen_addr
    }
}

async fn serve_http(listener: TcpListener, app: Router) -> RpcResult<()> {
    axum::serve(listener, app).await?;
    Ok(())
}

/// Handle JSON-RPC requests over HTTP
async fn handle_rpc(State(state): State<Arc<ServerState>>, body: Bytes) -> Response {
    match state.handler.handle_body(&body, None).await {
        Ok(response) => Json(response).into_response(),
        Err(error) => (StatusCode::BAD_REQUEST, Json(error)).into_response(),
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn handle_ws(State(state): State<Arc<ServerState>>, ws: WebSocketUpgrade) -> Response {
    let handler = state.handler.clone();
    let queue_size = state.queue_size;
    ws.on_upgrade(move |socket| serve_websocket(socket, handler, queue_size))
}

async fn serve_websocket(socket: WebSocket, handler: RpcHandler, queue_size: usize) {
    let (sink, stream) = socket.split();
    let incoming = stream
        .take_while(|message| {
            future::ready(matches!(message, Ok(m) if !matches!(m, Message::Close(_))))
        })
        .filter_map(|message| {
            future::ready(match message {
                Ok(Message::Text(text)) => Some(text),
                Ok(Message::Binary(bytes)) => String::from_utf8(bytes).ok(),
                _ => None,
            })
        });
    let outgoing = sink.with(|text: String| future::ready(Ok::<_, axum::Error>(Message::Text(text))));
    serve_connection(handler, incoming, outgoing, queue_size).await;
}
