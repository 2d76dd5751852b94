pub mod echo;

use std::sync::Arc;

use rpcsocket_lite::{
    Bridge, BridgeConfig, BridgeOptions, ConfigError, MemoryServer, MemorySocket, RpcClient,
};

/// Prefix of the environment variables read as the process-wide config source.
pub const CONFIG_ENV_PREFIX: &str = "BRIDGE";

/// Resolve the bridge config: defaults, then `BRIDGE_*` variables, then the
/// per-instance `options`.
pub fn resolve_config(options: BridgeOptions) -> Result<BridgeConfig, ConfigError> {
    let source = BridgeOptions::from_env(CONFIG_ENV_PREFIX)?;
    Ok(BridgeConfig::default().merge(source).merge(options))
}

/// Build an in-process socket server whose connections proxy `client`.
pub fn socket_server(client: Arc<dyn RpcClient>, config: BridgeConfig) -> MemoryServer {
    let bridge = Bridge::new(client, config);
    let mut server = MemoryServer::new();
    server.use_middleware(move |socket: &Arc<MemorySocket>, next| bridge.proxy(socket, next));
    server
}
