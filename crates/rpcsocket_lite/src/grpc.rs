//! Calling a remote gRPC service by routing identifier.
//!
//! [`GrpcChannel`] performs the same calls generated tonic clients do, but
//! takes the method path at runtime. Registering a remote method only needs
//! message types that are both `prost` messages and serde-(de)serializable:
//!
//! ```ignore
//! let channel = GrpcChannel::new(Channel::from_static("http://[::1]:50051").connect_lazy());
//! let table = MethodTable::new()
//!     .grpc_unary::<DroneCommand, CommandAck>(&channel, "/drone.DroneService/SendCommand");
//! ```

use serde::Serialize;
use serde::de::DeserializeOwned;
use tonic::client::Grpc;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;
use tonic::{Request, Status, Streaming};
use tonic_prost::ProstCodec;
use tracing::debug;

use crate::method::MethodTable;

/// A cloneable handle for untyped gRPC calls over one channel.
#[derive(Debug, Clone)]
pub struct GrpcChannel {
    inner: Grpc<Channel>,
}

impl GrpcChannel {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: Grpc::new(channel),
        }
    }

    /// Make a unary call to `path`, e.g. `/drone.DroneService/SendCommand`.
    pub async fn unary<Req, Resp>(&self, path: &str, request: Req) -> Result<Resp, Status>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let path = parse_path(path)?;
        let mut grpc = self.ready().await?;
        debug!(path = %path, "gRPC unary request");

        let codec = ProstCodec::<Req, Resp>::default();
        let response = grpc.unary(Request::new(request), path, codec).await?;
        Ok(response.into_inner())
    }

    /// Start a server-streaming call to `path`.
    pub async fn server_streaming<Req, Resp>(
        &self,
        path: &str,
        request: Req,
    ) -> Result<Streaming<Resp>, Status>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let path = parse_path(path)?;
        let mut grpc = self.ready().await?;
        debug!(path = %path, "gRPC server stream request");

        let codec = ProstCodec::<Req, Resp>::default();
        let response = grpc
            .server_streaming(Request::new(request), path, codec)
            .await?;
        Ok(response.into_inner())
    }

    async fn ready(&self) -> Result<Grpc<Channel>, Status> {
        let mut grpc = self.inner.clone();
        grpc.ready()
            .await
            .map_err(|e| Status::unavailable(format!("service was not ready: {e}")))?;
        Ok(grpc)
    }
}

fn parse_path(path: &str) -> Result<PathAndQuery, Status> {
    PathAndQuery::try_from(path)
        .map_err(|e| Status::invalid_argument(format!("invalid gRPC path '{path}': {e}")))
}

impl MethodTable {
    /// Register a unary method served by a remote gRPC backend.
    pub fn grpc_unary<Req, Resp>(self, channel: &GrpcChannel, path: impl Into<String>) -> Self
    where
        Req: prost::Message + DeserializeOwned + Send + Sync + 'static,
        Resp: prost::Message + Serialize + Default + Send + Sync + 'static,
    {
        let path = path.into();
        let channel = channel.clone();
        let target = path.clone();
        self.unary(path, move |request: Req| {
            let channel = channel.clone();
            let target = target.clone();
            async move { channel.unary::<Req, Resp>(&target, request).await }
        })
    }

    /// Register a server-streaming method served by a remote gRPC backend.
    pub fn grpc_server_streaming<Req, Resp>(
        self,
        channel: &GrpcChannel,
        path: impl Into<String>,
    ) -> Self
    where
        Req: prost::Message + DeserializeOwned + Send + Sync + 'static,
        Resp: prost::Message + Serialize + Default + Send + Sync + 'static,
    {
        let path = path.into();
        let channel = channel.clone();
        let target = path.clone();
        self.server_streaming(path, move |request: Req| {
            let channel = channel.clone();
            let target = target.clone();
            async move { channel.server_streaming::<Req, Resp>(&target, request).await }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::RpcClient;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    struct Ping {
        #[prost(string, tag = "1")]
        request_data: String,
    }

    #[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    struct Pong {
        #[prost(string, tag = "1")]
        response_data: String,
    }

    /// A channel to a port nothing listens on.
    fn dead_channel() -> GrpcChannel {
        GrpcChannel::new(Channel::from_static("http://127.0.0.1:1").connect_lazy())
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(
            parse_path("/drone.DroneService/SendCommand").unwrap().path(),
            "/drone.DroneService/SendCommand"
        );
        assert!(parse_path("not a path").is_err());
    }

    #[tokio::test]
    async fn test_grpc_methods_listed() {
        let channel = dead_channel();
        let table = MethodTable::new()
            .grpc_unary::<Ping, Pong>(&channel, "/ping.PingService/Ping")
            .grpc_server_streaming::<Ping, Pong>(&channel, "/ping.PingService/Watch");

        let shapes: Vec<_> = table
            .methods()
            .into_iter()
            .map(|d| (d.name, d.response_stream))
            .collect();
        assert_eq!(
            shapes,
            vec![
                ("Ping".to_string(), false),
                ("ping".to_string(), false),
                ("Watch".to_string(), true),
                ("watch".to_string(), true),
            ]
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_rpc_error() {
        let table =
            MethodTable::new().grpc_unary::<Ping, Pong>(&dead_channel(), "/ping.PingService/Ping");

        let status = table
            .call_unary("ping", json!({ "requestData": "hello" }))
            .await
            .unwrap_err();
        assert!(matches!(
            status.code(),
            tonic::Code::Unavailable | tonic::Code::Unknown
        ));
    }
}
