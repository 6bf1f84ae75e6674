//! HTTP/WebSocket boundary of the rover hub
//!
//! Thin axum surface: `/ws` upgrades to the persistent client channel and
//! runs the per-connection receive loop against the hub, `/health` answers
//! liveness probes. The health endpoint is served by independent tasks and
//! stays responsive regardless of control-loop activity.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use color_eyre::eyre::Result;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::hub::ConnectionHub;

/// Outbound messages queued per connection before the transport write.
const OUTBOUND_BUFFER: usize = 32;

pub fn router(hub: Arc<ConnectionHub>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .with_state(hub)
}

/// Binds the configured address and serves until the process exits.
pub async fn serve(config: &ServerConfig, hub: Arc<ConnectionHub>) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(
        listener,
        router(hub).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(hub): State<Arc<ConnectionHub>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, addr.to_string(), hub))
}

/// Per-connection lifecycle: register with the hub, pump broadcasts out,
/// dispatch inbound messages until the transport closes.
async fn handle_connection(socket: WebSocket, peer: String, hub: Arc<ConnectionHub>) {
    let (mut sink, mut stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);
    let id = hub.accept(peer.clone(), outbound_tx).await;

    // Writer task drains the hub's channel into the socket in FIFO order.
    // When a transport write fails it exits, and the next broadcast send
    // into the dropped channel evicts this client.
    let writer = tokio::spawn(async move {
        while let Some(payload) = outbound_rx.recv().await {
            if sink.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
    });

    run_receive_loop(&mut stream, &peer, &hub).await;

    hub.remove(id).await;
    writer.abort();
}

/// Reads messages until the transport closes, dispatching each decoded one.
///
/// A single malformed message never terminates the loop; the next valid
/// message is still dispatched.
async fn run_receive_loop<S>(stream: &mut S, peer: &str, hub: &ConnectionHub)
where
    S: futures_util::Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<Value>(&text) {
                Ok(value) => hub.dispatch(value).await,
                Err(e) => warn!("Malformed message from {}: {}", peer, e),
            },
            Ok(Message::Close(_)) => {
                info!("Client {} requested close", peer);
                break;
            }
            Ok(other) => debug!("Ignoring non-text frame from {}: {:?}", peer, other),
            Err(e) => {
                warn!("Receive error from {}: {}", peer, e);
                break;
            }
        }
    }
}
