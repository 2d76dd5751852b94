//! An in-process implementation of the messaging transport.
//!
//! [`MemoryServer`] runs a middleware chain for every new connection, the way
//! a realtime server would. The server side of a connection is a
//! [`MemorySocket`]; the client side is a [`MemoryPeer`], which emits events
//! (optionally waiting for their acknowledgment) and receives whatever the
//! server emits back.

use dashmap::DashMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::PeerError;
use crate::socket::{Ack, AckResult, EventHandler, Next, Socket};

/// An event emitted by the server side of a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Emitted {
    pub event: String,
    pub payload: Vec<Value>,
}

/// Server side of an in-process connection.
pub struct MemorySocket {
    id: String,
    handlers: DashMap<String, Vec<EventHandler>, ahash::RandomState>,
    outbound: mpsc::UnboundedSender<Emitted>,
}

impl MemorySocket {
    fn new(outbound: mpsc::UnboundedSender<Emitted>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            handlers: DashMap::default(),
            outbound,
        }
    }

    /// Check if anything is subscribed to `event`.
    pub fn has_handler(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }

    /// Names of all subscribed events.
    pub fn events(&self) -> Vec<String> {
        self.handlers.iter().map(|e| e.key().clone()).collect()
    }

    /// Run the handlers for an incoming event. The ack goes to the first one.
    fn deliver(&self, event: &str, args: Value, ack: Option<Ack>) -> Result<(), PeerError> {
        // Clone out of the map so handlers can subscribe without deadlocking.
        let handlers = self
            .handlers
            .get(event)
            .map(|h| h.value().clone())
            .ok_or_else(|| PeerError::NoHandler(event.to_string()))?;

        let mut ack = ack;
        for handler in handlers {
            handler(args.clone(), ack.take());
        }
        Ok(())
    }
}

impl Socket for MemorySocket {
    fn id(&self) -> &str {
        &self.id
    }

    fn on(&self, event: &str, handler: EventHandler) {
        self.handlers
            .entry(event.to_string())
            .or_default()
            .push(handler);
    }

    fn emit(&self, event: &str, payload: Vec<Value>) {
        let emitted = Emitted {
            event: event.to_string(),
            payload,
        };
        if self.outbound.send(emitted).is_err() {
            debug!(socket_id = %self.id, event = %event, "Peer gone, dropping emitted event");
        }
    }
}

impl fmt::Debug for MemorySocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySocket")
            .field("id", &self.id)
            .field("events", &self.handlers.len())
            .finish()
    }
}

/// Client side of an in-process connection.
#[derive(Debug)]
pub struct MemoryPeer {
    socket: Arc<MemorySocket>,
    inbound: mpsc::UnboundedReceiver<Emitted>,
}

impl MemoryPeer {
    /// The server side of this connection.
    pub fn socket(&self) -> &Arc<MemorySocket> {
        &self.socket
    }

    /// Emit an event without asking for an acknowledgment.
    pub fn emit(&self, event: &str, args: Value) -> Result<(), PeerError> {
        self.socket.deliver(event, args, None)
    }

    /// Emit an event and return a receiver for its acknowledgment.
    pub fn emit_with_ack(
        &self,
        event: &str,
        args: Value,
    ) -> Result<oneshot::Receiver<AckResult>, PeerError> {
        let (tx, rx) = oneshot::channel();
        let ack = Ack::new(move |result| {
            let _ = tx.send(result);
        });
        self.socket.deliver(event, args, Some(ack))?;
        Ok(rx)
    }

    /// Emit an event and wait for its acknowledgment.
    pub async fn call(&self, event: &str, args: Value) -> Result<AckResult, PeerError> {
        self.emit_with_ack(event, args)?
            .await
            .map_err(|_| PeerError::AckDropped(event.to_string()))
    }

    /// Wait for the next event emitted by the server.
    pub async fn next_emitted(&mut self) -> Option<Emitted> {
        self.inbound.recv().await
    }

    /// Take an already emitted event, if any.
    pub fn try_next_emitted(&mut self) -> Option<Emitted> {
        self.inbound.try_recv().ok()
    }
}

/// Connection middleware: receives each new socket and a continuation.
pub type Middleware = Arc<dyn Fn(&Arc<MemorySocket>, Next) + Send + Sync>;

/// Accepts in-process connections through a middleware chain.
#[derive(Default, Clone)]
pub struct MemoryServer {
    middleware: Vec<Middleware>,
}

impl MemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware to the chain.
    pub fn use_middleware<F>(&mut self, middleware: F) -> &mut Self
    where
        F: Fn(&Arc<MemorySocket>, Next) + Send + Sync + 'static,
    {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Open a connection.
    ///
    /// Middleware runs in registration order; the connection is rejected if
    /// one of them does not call its continuation.
    pub fn connect(&self) -> Result<MemoryPeer, PeerError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let socket = Arc::new(MemorySocket::new(tx));

        for middleware in &self.middleware {
            let proceeded = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&proceeded);
            middleware(&socket, Box::new(move || flag.store(true, Ordering::SeqCst)));

            if !proceeded.load(Ordering::SeqCst) {
                debug!(socket_id = %socket.id(), "Connection rejected by middleware");
                return Err(PeerError::Rejected);
            }
        }

        info!(socket_id = %socket.id(), "Connection established");
        Ok(MemoryPeer {
            socket,
            inbound: rx,
        })
    }
}

impl fmt::Debug for MemoryServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryServer")
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_server() -> MemoryServer {
        let mut server = MemoryServer::new();
        server.use_middleware(|socket, next| {
            let weak = Arc::downgrade(socket);
            socket.on(
                "echo",
                Arc::new(move |args: Value, ack: Option<Ack>| {
                    if let Some(socket) = weak.upgrade() {
                        socket.emit("echoed", vec![args.clone()]);
                    }
                    if let Some(ack) = ack {
                        ack.send(Ok(args));
                    }
                }),
            );
            next();
        });
        server
    }

    #[tokio::test]
    async fn test_call_with_ack() {
        let mut peer = echo_server().connect().unwrap();

        let result = peer.call("echo", json!({ "a": 1 })).await.unwrap();
        assert_eq!(result.unwrap(), json!({ "a": 1 }));

        let emitted = peer.next_emitted().await.unwrap();
        assert_eq!(emitted.event, "echoed");
        assert_eq!(emitted.payload, vec![json!({ "a": 1 })]);
    }

    #[test]
    fn test_unknown_event() {
        let peer = echo_server().connect().unwrap();
        assert!(matches!(
            peer.emit("nope", json!({})),
            Err(PeerError::NoHandler(event)) if event == "nope"
        ));
    }

    #[tokio::test]
    async fn test_dropped_ack() {
        let mut server = MemoryServer::new();
        server.use_middleware(|socket, next| {
            socket.on("ignore", Arc::new(|_args: Value, _ack: Option<Ack>| {}));
            next();
        });
        let peer = server.connect().unwrap();

        assert!(matches!(
            peer.call("ignore", json!({})).await,
            Err(PeerError::AckDropped(_))
        ));
    }

    #[test]
    fn test_middleware_must_call_next() {
        let mut server = echo_server();
        server.use_middleware(|_socket, _next| {});
        assert!(matches!(server.connect(), Err(PeerError::Rejected)));
    }

    #[test]
    fn test_middleware_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut server = MemoryServer::new();
        for i in 0..3 {
            let order = Arc::clone(&order);
            server.use_middleware(move |_socket, next| {
                order.lock().unwrap().push(i);
                next();
            });
        }

        server.connect().unwrap();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_socket_ids_unique() {
        let server = echo_server();
        let a = server.connect().unwrap();
        let b = server.connect().unwrap();
        assert_ne!(a.socket().id(), b.socket().id());
        assert!(a.socket().has_handler("echo"));
        assert_eq!(a.socket().events(), vec!["echo".to_string()]);
    }
}
