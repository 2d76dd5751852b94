use futures::{Stream, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tonic::Status;

use crate::names::lower_first;

/// The eventual result of a unary call.
pub type UnaryFuture = Pin<Box<dyn Future<Output = Result<Value, Status>> + Send>>;

/// The responses of a server-streaming call.
pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<Value, Status>> + Send>>;

/// The eventual response stream of a server-streaming call.
pub type ServerStreamFuture = Pin<Box<dyn Future<Output = Result<ResponseStream, Status>> + Send>>;

/// How a method exchanges messages, derived from its stream flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallShape {
    Unary,
    ServerStreaming,
    ClientStreaming,
    BidiStreaming,
}

impl CallShape {
    pub fn from_flags(request_stream: bool, response_stream: bool) -> Self {
        match (request_stream, response_stream) {
            (false, false) => CallShape::Unary,
            (false, true) => CallShape::ServerStreaming,
            (true, false) => CallShape::ClientStreaming,
            (true, true) => CallShape::BidiStreaming,
        }
    }
}

/// One entry of an RPC client's method table.
///
/// A method may appear under several names (e.g. `SendCommand` and
/// `sendCommand`); the routing identifier is what identifies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Key of the entry in the method table.
    pub name: String,
    /// Routing identifier, e.g. `/drone.DroneService/SendCommand`.
    pub path: Option<String>,
    pub request_stream: bool,
    pub response_stream: bool,
}

impl MethodDescriptor {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        request_stream: bool,
        response_stream: bool,
    ) -> Self {
        Self {
            name: name.into(),
            path: Some(path.into()),
            request_stream,
            response_stream,
        }
    }

    pub fn shape(&self) -> CallShape {
        CallShape::from_flags(self.request_stream, self.response_stream)
    }
}

/// The RPC side of the bridge.
///
/// Methods are invoked by their canonical (lower-first) name. Implementations
/// are shared by every connection and must tolerate concurrent calls.
pub trait RpcClient: Send + Sync + 'static {
    /// Every method the client exposes, aliases included.
    fn methods(&self) -> Vec<MethodDescriptor>;

    /// Start a unary call.
    fn call_unary(&self, method: &str, request: Value) -> UnaryFuture;

    /// Start a server-streaming call.
    fn call_server_stream(&self, method: &str, request: Value) -> ServerStreamFuture;
}

type UnaryFn = Arc<dyn Fn(Value) -> UnaryFuture + Send + Sync>;
type ServerStreamFn = Arc<dyn Fn(Value) -> ServerStreamFuture + Send + Sync>;

#[derive(Clone)]
enum Invoker {
    Unary(UnaryFn),
    ServerStreaming(ServerStreamFn),
    /// Listed in the table but not invocable through the bridge.
    Declared,
}

/// An [`RpcClient`] assembled from async closures.
///
/// # Example
/// ```ignore
/// let table = MethodTable::new()
///     .unary("/drone.DroneService/SendCommand", |cmd: DroneCommand| async move {
///         Ok(CommandAck { accepted: true, message: String::new() })
///     });
/// ```
#[derive(Default, Clone)]
pub struct MethodTable {
    descriptors: Vec<MethodDescriptor>,
    invokers: HashMap<String, Invoker>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unary method.
    ///
    /// The JSON request is decoded into `Req`; a request that does not fit is
    /// answered with `invalid_argument` without calling `f`.
    pub fn unary<Req, Resp, F, Fut>(self, path: impl Into<String>, f: F) -> Self
    where
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + Send + 'static,
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, Status>> + Send + 'static,
    {
        let invoker: UnaryFn = Arc::new(move |request| -> UnaryFuture {
            let call = decode::<Req>(request).map(&f);
            Box::pin(async move {
                let response = call?.await?;
                encode(&response)
            })
        });
        self.insert(path.into(), false, false, Invoker::Unary(invoker))
    }

    /// Register a server-streaming method.
    pub fn server_streaming<Req, Resp, F, Fut, S>(self, path: impl Into<String>, f: F) -> Self
    where
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + Send + 'static,
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S, Status>> + Send + 'static,
        S: Stream<Item = Result<Resp, Status>> + Send + 'static,
    {
        let invoker: ServerStreamFn = Arc::new(move |request| -> ServerStreamFuture {
            let call = decode::<Req>(request).map(&f);
            Box::pin(async move {
                let stream = call?.await?;
                let encoded = stream.map(|item| item.and_then(|response| encode(&response)));
                Ok(Box::pin(encoded) as ResponseStream)
            })
        });
        self.insert(path.into(), false, true, Invoker::ServerStreaming(invoker))
    }

    /// List a request-streaming method without making it invocable.
    pub fn declare(
        self,
        path: impl Into<String>,
        request_stream: bool,
        response_stream: bool,
    ) -> Self {
        self.insert(path.into(), request_stream, response_stream, Invoker::Declared)
    }

    /// Check if a method is registered under the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.invokers.contains_key(name)
    }

    fn insert(
        mut self,
        path: String,
        request_stream: bool,
        response_stream: bool,
        invoker: Invoker,
    ) -> Self {
        let method = path.rsplit('/').next().unwrap_or_default().to_string();
        let alias = lower_first(&method);

        let mut names = vec![method];
        if alias != names[0] {
            names.push(alias);
        }

        for name in names {
            self.descriptors.retain(|d| d.name != name);
            self.descriptors.push(MethodDescriptor {
                name: name.clone(),
                path: Some(path.clone()),
                request_stream,
                response_stream,
            });
            self.invokers.insert(name, invoker.clone());
        }
        self
    }
}

impl RpcClient for MethodTable {
    fn methods(&self) -> Vec<MethodDescriptor> {
        self.descriptors.clone()
    }

    fn call_unary(&self, method: &str, request: Value) -> UnaryFuture {
        match self.invokers.get(method) {
            Some(Invoker::Unary(f)) => f(request),
            _ => {
                let status = Status::unimplemented(format!("no unary method '{method}'"));
                Box::pin(async move { Err(status) })
            }
        }
    }

    fn call_server_stream(&self, method: &str, request: Value) -> ServerStreamFuture {
        match self.invokers.get(method) {
            Some(Invoker::ServerStreaming(f)) => f(request),
            _ => {
                let status =
                    Status::unimplemented(format!("no server-streaming method '{method}'"));
                Box::pin(async move { Err(status) })
            }
        }
    }
}

impl fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodTable")
            .field("descriptors", &self.descriptors)
            .finish()
    }
}

fn decode<Req: DeserializeOwned>(request: Value) -> Result<Req, Status> {
    serde_json::from_value(request)
        .map_err(|e| Status::invalid_argument(format!("failed to decode request: {e}")))
}

fn encode<Resp: Serialize>(response: &Resp) -> Result<Value, Status> {
    serde_json::to_value(response)
        .map_err(|e| Status::internal(format!("failed to encode response: {e}")))
}
