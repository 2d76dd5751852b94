use anyhow::Result;
use grpc_socket_bridge::echo::{self, SERVER_STREAM_ONE, UNARY_CALL_ONE};
use grpc_socket_bridge::{resolve_config, socket_server};
use rpcsocket_lite::{BridgeOptions, GrpcChannel, RpcClient};
use serde_json::json;
use std::sync::Arc;
use tonic::transport::Channel;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = resolve_config(BridgeOptions::default())?;
    info!(?config, "Resolved bridge config");

    let client: Arc<dyn RpcClient> = match std::env::var("GRPC_ADDR") {
        Ok(addr) => {
            info!(addr = %addr, "Forwarding to gRPC backend");
            let channel = Channel::from_shared(addr)?.connect_lazy();
            Arc::new(echo::remote_table(&GrpcChannel::new(channel)))
        }
        Err(_) => {
            info!("GRPC_ADDR not set, serving the in-process echo service");
            Arc::new(echo::echo_table())
        }
    };

    let server = socket_server(client, config);
    let mut peer = server.connect()?;

    match peer
        .call(UNARY_CALL_ONE, json!({ "requestData": "test" }))
        .await?
    {
        Ok(response) => info!(%response, "Unary response"),
        Err(e) => warn!(error = %e, "Unary call failed"),
    }

    let done = peer
        .call(SERVER_STREAM_ONE, json!({ "requestData": "tick" }))
        .await?;
    while let Some(emitted) = peer.try_next_emitted() {
        info!(event = %emitted.event, payload = ?emitted.payload, "Received");
    }
    match done {
        Ok(_) => info!("Server stream finished"),
        Err(e) => warn!(error = %e, "Server stream failed"),
    }

    Ok(())
}
