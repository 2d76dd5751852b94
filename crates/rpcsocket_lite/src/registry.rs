use std::collections::BTreeMap;
use tracing::debug;

use crate::classify::Classification;
use crate::config::BridgeConfig;
use crate::names::route_keys;

/// The RPC a socket event resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Unary(String),
    ServerStreaming(String),
}

impl Route {
    /// Canonical name of the method to invoke.
    pub fn method(&self) -> &str {
        match self {
            Route::Unary(method) | Route::ServerStreaming(method) => method,
        }
    }
}

/// Event name to method mappings, one per call shape.
///
/// Built once per bridge and never modified afterwards.
#[derive(Debug, Clone, Default)]
pub struct RouteRegistry {
    unary: BTreeMap<String, String>,
    server_streaming: BTreeMap<String, String>,
}

impl RouteRegistry {
    /// Register both event-name spellings of every classified method,
    /// skipping call shapes the config disables.
    pub fn build(classification: &Classification, config: &BridgeConfig) -> Self {
        let mut registry = Self::default();

        if config.proxy_unary_calls {
            insert_routes(&mut registry.unary, &classification.unary);
            debug!(routes = ?registry.unary, "gRPC unary calls");
        } else {
            debug!("gRPC unary calls are not proxied");
        }

        if config.proxy_server_stream_calls {
            insert_routes(&mut registry.server_streaming, &classification.server_streaming);
            debug!(routes = ?registry.server_streaming, "gRPC server stream calls");
        } else {
            debug!("gRPC server stream calls are not proxied");
        }

        registry
    }

    /// Method behind a unary event.
    pub fn unary(&self, event: &str) -> Option<&str> {
        self.unary.get(event).map(String::as_str)
    }

    /// Method behind a server-streaming event.
    pub fn server_streaming(&self, event: &str) -> Option<&str> {
        self.server_streaming.get(event).map(String::as_str)
    }

    /// Every event name with its route, unary routes first.
    pub fn routes(&self) -> impl Iterator<Item = (&str, Route)> + '_ {
        let unary = self
            .unary
            .iter()
            .map(|(event, method)| (event.as_str(), Route::Unary(method.clone())));
        let streaming = self
            .server_streaming
            .iter()
            .map(|(event, method)| (event.as_str(), Route::ServerStreaming(method.clone())));
        unary.chain(streaming)
    }

    pub fn unary_len(&self) -> usize {
        self.unary.len()
    }

    pub fn server_streaming_len(&self) -> usize {
        self.server_streaming.len()
    }

    pub fn len(&self) -> usize {
        self.unary.len() + self.server_streaming.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn insert_routes(map: &mut BTreeMap<String, String>, paths: &[String]) {
    for path in paths {
        let keys = route_keys(path);
        map.insert(keys.lower, keys.name.clone());
        map.insert(keys.upper, keys.name);
    }
}
