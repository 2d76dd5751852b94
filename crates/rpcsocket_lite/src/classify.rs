use std::collections::HashSet;
use tracing::debug;

use crate::method::{CallShape, MethodDescriptor};

/// Routing identifiers of the methods the bridge can expose, by call shape.
///
/// Identifiers keep the order in which they first appear in the method table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub unary: Vec<String>,
    pub server_streaming: Vec<String>,
}

/// Partition a method table into unary and server-streaming routes.
///
/// Request-streaming methods and methods without a routing identifier are
/// left out. Aliases sharing a routing identifier collapse into one route.
pub fn classify(methods: &[MethodDescriptor]) -> Classification {
    let mut seen = HashSet::new();
    let mut classification = Classification::default();

    for method in methods {
        let Some(path) = method.path.as_deref().filter(|p| !p.is_empty()) else {
            debug!(name = %method.name, "Skipping method without routing identifier");
            continue;
        };

        let bucket = match method.shape() {
            CallShape::Unary => &mut classification.unary,
            CallShape::ServerStreaming => &mut classification.server_streaming,
            shape @ (CallShape::ClientStreaming | CallShape::BidiStreaming) => {
                debug!(path = %path, ?shape, "Skipping request-streaming method");
                continue;
            }
        };

        if seen.insert(path.to_string()) {
            bucket.push(path.to_string());
        }
    }

    debug!(
        unary = ?classification.unary,
        server_streaming = ?classification.server_streaming,
        "Classified RPC methods"
    );
    classification
}
