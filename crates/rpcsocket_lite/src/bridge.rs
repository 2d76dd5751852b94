use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::classify::classify;
use crate::config::{BridgeConfig, BridgeOptions};
use crate::dispatch::Dispatcher;
use crate::method::RpcClient;
use crate::registry::RouteRegistry;
use crate::socket::{Ack, EventHandler, Next, Socket};

/// Exposes the methods of an [`RpcClient`] as socket events.
///
/// Routes are derived once, at construction; every connection passed to
/// [`Bridge::proxy`] shares them.
#[derive(Clone)]
pub struct Bridge {
    dispatcher: Arc<Dispatcher>,
    routes: Arc<RouteRegistry>,
}

impl Bridge {
    /// Create a bridge with a fully resolved config.
    pub fn new(client: Arc<dyn RpcClient>, config: BridgeConfig) -> Self {
        debug!(?config, "gRPC bridge constructed");

        let classification = classify(&client.methods());
        let routes = RouteRegistry::build(&classification, &config);

        info!(
            unary = routes.unary_len(),
            server_streaming = routes.server_streaming_len(),
            "Registered gRPC routes"
        );

        Self {
            dispatcher: Arc::new(Dispatcher::new(client, config)),
            routes: Arc::new(routes),
        }
    }

    /// Create a bridge from defaults overridden by `options`.
    pub fn with_options(client: Arc<dyn RpcClient>, options: BridgeOptions) -> Self {
        Self::new(client, BridgeConfig::default().merge(options))
    }

    pub fn config(&self) -> &BridgeConfig {
        self.dispatcher.config()
    }

    pub fn routes(&self) -> &RouteRegistry {
        &self.routes
    }

    /// Subscribe every route on a new connection, then let it proceed.
    ///
    /// Handlers only hold a weak reference to the socket, so subscribing does
    /// not keep the connection alive.
    pub fn proxy<S>(&self, socket: &Arc<S>, next: impl FnOnce())
    where
        S: Socket + 'static,
    {
        for (event, route) in self.routes.routes() {
            let dispatcher = Arc::clone(&self.dispatcher);
            let weak = Arc::downgrade(socket);
            let path = event.to_string();

            let handler: EventHandler = Arc::new(move |args: Value, ack: Option<Ack>| {
                match weak.upgrade() {
                    Some(socket) => dispatcher.dispatch(socket, &path, &route, args, ack),
                    None => debug!(path = %path, "Socket closed before dispatch"),
                }
            });
            socket.on(event, handler);
        }

        debug!(socket_id = %socket.id(), routes = self.routes.len(), "Proxied gRPC routes");
        next();
    }
}

/// Build the per-connection middleware for `client`.
///
/// # Example
/// ```ignore
/// let mut server = MemoryServer::new();
/// server.use_middleware(middleware(Arc::new(table), BridgeOptions::default()));
/// ```
pub fn middleware<S>(
    client: Arc<dyn RpcClient>,
    options: BridgeOptions,
) -> impl Fn(&Arc<S>, Next) + Send + Sync + 'static
where
    S: Socket + 'static,
{
    let bridge = Bridge::with_options(client, options);
    move |socket: &Arc<S>, next: Next| bridge.proxy(socket, next)
}
