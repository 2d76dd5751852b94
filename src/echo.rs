//! A small echo service, served in-process or by a remote gRPC backend.

use async_stream::stream;
use rpcsocket_lite::{GrpcChannel, MethodTable};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tonic::Status;

pub const UNARY_CALL_ONE: &str = "/grpcbridge.EchoService/UnaryCallOne";
pub const SERVER_STREAM_ONE: &str = "/grpcbridge.EchoService/ServerStreamOne";
pub const CLIENT_STREAM_ONE: &str = "/grpcbridge.EchoService/ClientStreamOne";
pub const BIDI_STREAM_ONE: &str = "/grpcbridge.EchoService/BidiStreamOne";

/// Number of messages `ServerStreamOne` sends per request.
pub const STREAM_LENGTH: usize = 3;

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EchoRequest {
    #[prost(string, tag = "1")]
    pub request_data: String,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EchoResponse {
    #[prost(string, tag = "1")]
    pub response_data: String,
}

/// The echo service implemented in-process.
pub fn echo_table() -> MethodTable {
    MethodTable::new()
        .unary(UNARY_CALL_ONE, |req: EchoRequest| async move {
            if req.request_data.is_empty() {
                return Err(Status::invalid_argument("requestData must not be empty"));
            }
            Ok(EchoResponse {
                response_data: "unaryCallOneData".to_string(),
            })
        })
        .server_streaming(SERVER_STREAM_ONE, |req: EchoRequest| async move {
            let chunks = stream! {
                for i in 0..STREAM_LENGTH {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    yield Ok(EchoResponse {
                        response_data: format!("{}-{i}", req.request_data),
                    });
                }
            };
            Ok::<_, Status>(chunks)
        })
        .declare(CLIENT_STREAM_ONE, true, false)
        .declare(BIDI_STREAM_ONE, true, true)
}

/// The echo service forwarded to a gRPC backend.
pub fn remote_table(channel: &GrpcChannel) -> MethodTable {
    MethodTable::new()
        .grpc_unary::<EchoRequest, EchoResponse>(channel, UNARY_CALL_ONE)
        .grpc_server_streaming::<EchoRequest, EchoResponse>(channel, SERVER_STREAM_ONE)
        .declare(CLIENT_STREAM_ONE, true, false)
        .declare(BIDI_STREAM_ONE, true, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket_server;
    use rpcsocket_lite::{BridgeConfig, CallError};
    use serde_json::{Value, json};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_unary_call_one() {
        let peer = socket_server(Arc::new(echo_table()), BridgeConfig::default())
            .connect()
            .unwrap();

        let response = peer
            .call(
                "/grpcbridge.EchoService/unaryCallOne",
                json!({ "requestData": "test" }),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response, json!({ "responseData": "unaryCallOneData" }));
    }

    #[tokio::test]
    async fn test_backend_error_through_ack() {
        let peer = socket_server(Arc::new(echo_table()), BridgeConfig::default())
            .connect()
            .unwrap();

        let result = peer
            .call(UNARY_CALL_ONE, json!({ "requestData": "" }))
            .await
            .unwrap();
        match result {
            Err(CallError::Rpc(status)) => {
                assert_eq!(status.code(), tonic::Code::InvalidArgument);
                assert_eq!(status.message(), "requestData must not be empty");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_stream_one() {
        let mut peer = socket_server(Arc::new(echo_table()), BridgeConfig::default())
            .connect()
            .unwrap();

        let done = peer
            .call(SERVER_STREAM_ONE, json!({ "requestData": "tick" }))
            .await
            .unwrap();
        assert_eq!(done.unwrap(), Value::Null);

        let mut chunks = Vec::new();
        while let Some(emitted) = peer.try_next_emitted() {
            chunks.extend(emitted.payload);
        }
        assert_eq!(chunks.len(), STREAM_LENGTH);
        assert_eq!(chunks[0], json!({ "responseData": "tick-0" }));
    }

    #[test]
    fn test_streaming_requests_not_routed() {
        let peer = socket_server(Arc::new(echo_table()), BridgeConfig::default())
            .connect()
            .unwrap();

        assert!(peer.socket().has_handler(UNARY_CALL_ONE));
        assert!(!peer.socket().has_handler(CLIENT_STREAM_ONE));
        assert!(!peer.socket().has_handler(BIDI_STREAM_ONE));
    }

    #[test]
    fn test_unary_routes_disabled() {
        let config = BridgeConfig::builder().proxy_unary_calls(false).build();
        let peer = socket_server(Arc::new(echo_table()), config).connect().unwrap();

        assert!(!peer.socket().has_handler(UNARY_CALL_ONE));
        assert!(peer.socket().has_handler(SERVER_STREAM_ONE));
    }
}
