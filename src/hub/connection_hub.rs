//! Connection registry with isolated broadcast and type-keyed dispatch
//!
//! The hub is constructed once in `main` and handed as an `Arc` to every
//! component that needs it (server, control loops, services). It never fails
//! a caller: broken clients are evicted, unroutable messages are dropped.

use chrono::{DateTime, Local};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::hub::message::{message_type, OutboundMessage};
use crate::services::HandlerService;

pub type ConnectionId = u64;

/// A live client channel as seen by the hub.
///
/// The hub only holds the outbound half; the per-connection writer task in
/// the server drains it into the WebSocket sink in FIFO order. When the
/// writer dies after a transport failure, the next send here errors and the
/// client is evicted.
struct ClientConnection {
    peer: String,
    connected_at: DateTime<Local>,
    outbound: mpsc::Sender<String>,
}

/// Shared broadcast/dispatch point for all connected clients.
pub struct ConnectionHub {
    clients: Mutex<HashMap<ConnectionId, ClientConnection>>,
    services: Mutex<HashMap<String, Box<dyn HandlerService>>>,
    next_id: AtomicU64,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            services: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a handler service for one inbound message type.
    ///
    /// Last registration for a given type wins.
    pub async fn register_service(&self, message_type: &str, service: Box<dyn HandlerService>) {
        info!(
            "Registered service for type '{}': {}",
            message_type,
            service.name()
        );
        let mut services = self.services.lock().await;
        if services.insert(message_type.to_string(), service).is_some() {
            warn!("Replaced existing handler for type '{}'", message_type);
        }
    }

    /// Adds a connection to the registry and returns its identity.
    pub async fn accept(&self, peer: String, outbound: mpsc::Sender<String>) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut clients = self.clients.lock().await;
        clients.insert(
            id,
            ClientConnection {
                peer: peer.clone(),
                connected_at: Local::now(),
                outbound,
            },
        );
        info!("Client connected: {} (id {})", peer, id);
        info!("[Client registered] Total: {}", clients.len());
        id
    }

    /// Removes a connection. Safe to call for an id that is already gone.
    pub async fn remove(&self, id: ConnectionId) {
        let mut clients = self.clients.lock().await;
        match clients.remove(&id) {
            Some(client) => {
                info!(
                    "Client disconnected: {} (id {}, connected since {})",
                    client.peer,
                    id,
                    client.connected_at.format("%H:%M:%S")
                );
                info!("[Client unregistered] Total: {}", clients.len());
            }
            None => debug!("Remove for unknown client id {} ignored", id),
        }
    }

    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Delivers a message to every connected client.
    ///
    /// Iterates a snapshot of the registry, so sends never hold the client
    /// lock. A failed send evicts that client only; delivery to the rest
    /// continues and the caller always sees success.
    pub async fn broadcast(&self, message: &OutboundMessage) {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize outbound message: {}", e);
                return;
            }
        };

        let snapshot: Vec<(ConnectionId, String, mpsc::Sender<String>)> = {
            let clients = self.clients.lock().await;
            clients
                .iter()
                .map(|(id, client)| (*id, client.peer.clone(), client.outbound.clone()))
                .collect()
        };

        for (id, peer, outbound) in snapshot {
            debug!("[Sending] {} -> {}", payload, peer);
            if let Err(e) = outbound.send(payload.clone()).await {
                error!("Failed to send to {} (id {}): {}", peer, id, e);
                self.remove(id).await;
            }
        }
    }

    /// Routes one inbound message to the handler registered for its type.
    ///
    /// Unknown types and handler errors are logged and dropped; dispatch is
    /// never fatal to the connection that delivered the message.
    pub async fn dispatch(&self, message: Value) {
        let Some(msg_type) = message_type(&message).map(str::to_string) else {
            warn!("Inbound message without a 'type' field dropped");
            return;
        };

        let mut services = self.services.lock().await;
        match services.get_mut(&msg_type) {
            Some(service) => {
                if let Err(e) = service.handle(message).await {
                    error!("Handler '{}' failed for '{}': {}", service.name(), msg_type, e);
                }
            }
            None => warn!("No handler registered for message type: {}", msg_type),
        }
    }
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new()
    }
}
