//! # rpcsocket_lite
//!
//! Exposes gRPC methods as events on a realtime socket connection.
//!
//! A consumer emits an event named after a gRPC method, with a JSON object as
//! argument and an acknowledgment callback. The bridge invokes the method and
//! answers through the acknowledgment exactly once: with the response, with
//! the error the backend reported, or with a timeout error if the call did not
//! finish in time.
//!
//! ```ignore
//! use rpcsocket_lite::{BridgeOptions, MemoryServer, MethodTable, middleware};
//!
//! let table = MethodTable::new()
//!     .unary("/drone.DroneService/SendCommand", |cmd: DroneCommand| async move {
//!         Ok(CommandAck { accepted: true, message: String::new() })
//!     });
//!
//! let mut server = MemoryServer::new();
//! server.use_middleware(middleware(Arc::new(table), BridgeOptions::default()));
//!
//! let peer = server.connect()?;
//! let ack = peer.call("/drone.DroneService/sendCommand", json!({ "droneId": "d-1" })).await?;
//! ```
//!
//! ## Event names
//!
//! A method with routing identifier `/{package}.{Service}/{Method}` is
//! reachable under two event names, `/{package}.{Service}/{Method}` and
//! `/{package}.{Service}/{method}`, i.e. with the method's first letter in
//! either case.
//!
//! ## Server streaming
//!
//! Each streamed message is emitted back on the connection as an event named
//! after the request path, with the message as its only argument. The
//! acknowledgment is answered with `null` when the stream ends, or with an
//! error if it fails or exceeds `server_stream_calls_timeout`.
//!
//! ## Rejected calls
//!
//! A call whose argument is not an object, or that comes without an
//! acknowledgment, is never forwarded. Each problem is reported as an `Error`
//! event carrying a message and the event path.

mod bridge;
mod classify;
mod config;
mod dispatch;
mod error;
mod method;
mod names;
mod registry;
mod socket;

pub mod grpc;
pub mod memory;

pub use bridge::{Bridge, middleware};
pub use classify::{Classification, classify};
pub use config::{
    BridgeConfig, BridgeOptions, DEFAULT_SERVER_STREAM_CALLS_TIMEOUT, DEFAULT_UNARY_CALLS_TIMEOUT,
};
pub use error::{CallError, ConfigError, PeerError, ValidationError};
pub use method::{
    CallShape, MethodDescriptor, MethodTable, ResponseStream, RpcClient, ServerStreamFuture,
    UnaryFuture,
};
pub use names::{RouteKeys, lower_first, route_keys, upper_first};
pub use registry::{Route, RouteRegistry};
pub use socket::{Ack, AckResult, ERROR_EVENT, EventHandler, Next, Socket};

// Convenience re-exports for common use
pub use grpc::GrpcChannel;
pub use memory::{Emitted, MemoryPeer, MemoryServer, MemorySocket};
