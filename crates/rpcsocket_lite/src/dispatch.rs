use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tonic::Status;
use tracing::{debug, warn};

use crate::config::BridgeConfig;
use crate::error::{CallError, ValidationError};
use crate::method::RpcClient;
use crate::registry::Route;
use crate::socket::{Ack, AckResult, ERROR_EVENT, Socket};

/// Turns socket events into RPC invocations.
pub(crate) struct Dispatcher {
    client: Arc<dyn RpcClient>,
    config: BridgeConfig,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn RpcClient>, config: BridgeConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Handle one incoming event.
    ///
    /// The RPC runs on its own task; must be called from within a Tokio
    /// runtime.
    pub fn dispatch<S>(
        &self,
        socket: Arc<S>,
        path: &str,
        route: &Route,
        args: Value,
        ack: Option<Ack>,
    ) where
        S: Socket + ?Sized + 'static,
    {
        let Some(ack) = validate(&*socket, path, &args, ack) else {
            return;
        };

        let client = Arc::clone(&self.client);
        match route {
            Route::Unary(method) => {
                tokio::spawn(run_unary(
                    client,
                    method.clone(),
                    path.to_string(),
                    args,
                    ack,
                    self.config.unary_calls_timeout,
                ));
            }
            Route::ServerStreaming(method) => {
                tokio::spawn(run_server_stream(
                    socket,
                    client,
                    method.clone(),
                    path.to_string(),
                    args,
                    ack,
                    self.config.server_stream_calls_timeout,
                ));
            }
        }
    }
}

/// Check the shape of an incoming call.
///
/// Arguments must be a JSON object or array; whether they fit the request is
/// left to the method's own decoding. Every failed check is reported as an
/// `Error` event carrying the message and the event path. Returns the ack only
/// when all checks pass.
pub(crate) fn validate<S>(socket: &S, path: &str, args: &Value, ack: Option<Ack>) -> Option<Ack>
where
    S: Socket + ?Sized,
{
    let mut passed = true;

    if !(args.is_object() || args.is_array()) {
        reject(socket, path, ValidationError::NotAnObject);
        passed = false;
    }

    if ack.is_none() {
        reject(socket, path, ValidationError::MissingAck);
        passed = false;
    }

    if passed { ack } else { None }
}

fn reject<S>(socket: &S, path: &str, error: ValidationError)
where
    S: Socket + ?Sized,
{
    debug!(path = %path, socket_id = %socket.id(), error = %error, "Rejected call");
    socket.emit(
        ERROR_EVENT,
        vec![Value::String(error.to_string()), Value::String(path.to_string())],
    );
}

/// State of one unary call waiting on either its RPC or its deadline.
///
/// Whichever side settles first uses the ack; the other is a no-op.
pub(crate) struct PendingUnaryCall {
    ack: Option<Ack>,
    timed_out: bool,
}

impl PendingUnaryCall {
    pub fn new(ack: Ack) -> Self {
        Self {
            ack: Some(ack),
            timed_out: false,
        }
    }

    /// The deadline passed.
    pub fn time_out(&mut self, after: Duration) {
        self.timed_out = true;
        if let Some(ack) = self.ack.take() {
            ack.send(Err(CallError::Timeout { after }));
        }
    }

    /// The RPC produced a result. Returns `false` if it was discarded.
    pub fn complete(&mut self, result: AckResult) -> bool {
        if self.timed_out {
            return false;
        }
        match self.ack.take() {
            Some(ack) => {
                ack.send(result);
                true
            }
            None => false,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        self.timed_out
    }
}

async fn run_unary(
    client: Arc<dyn RpcClient>,
    method: String,
    path: String,
    args: Value,
    ack: Ack,
    timeout: Duration,
) {
    let mut pending = PendingUnaryCall::new(ack);

    // Armed before the RPC is started so a fast completion can't outrun it.
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    debug!(path = %path, method = %method, "gRPC unary proxy request");
    let rpc = client.call_unary(&method, args);
    let rpc_path = path.clone();
    let mut call = tokio::spawn(async move {
        let result = rpc.await;
        debug!(path = %rpc_path, ok = result.is_ok(), "gRPC unary end");
        result
    });

    let finished = tokio::select! {
        joined = &mut call => Some(joined),
        () = &mut deadline => None,
    };

    match finished {
        Some(joined) => {
            let result = match joined {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(status)) => Err(CallError::Rpc(status)),
                Err(e) => Err(CallError::Internal(e.to_string())),
            };
            pending.complete(result);
        }
        None => {
            warn!(path = %path, timeout_ms = timeout.as_millis() as u64, "gRPC unary call timed out");
            // The RPC task is detached, not cancelled; its result is dropped.
            pending.time_out(timeout);
        }
    }

    debug!(path = %path, timed_out = pending.is_timed_out(), "gRPC unary proxy done");
}

async fn run_server_stream<S>(
    socket: Arc<S>,
    client: Arc<dyn RpcClient>,
    method: String,
    path: String,
    args: Value,
    ack: Ack,
    timeout: Duration,
) where
    S: Socket + ?Sized,
{
    debug!(path = %path, method = %method, "gRPC server stream proxy request");

    let forward = async {
        let mut stream = client.call_server_stream(&method, args).await?;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            debug!(path = %path, "gRPC server stream chunk");
            socket.emit(&path, vec![chunk]);
        }
        Ok::<_, Status>(())
    };

    let result = match tokio::time::timeout(timeout, forward).await {
        Ok(Ok(())) => {
            debug!(path = %path, "gRPC server stream end");
            Ok(Value::Null)
        }
        Ok(Err(status)) => {
            warn!(path = %path, error = %status, "gRPC server stream error");
            Err(CallError::Rpc(status))
        }
        Err(_) => {
            warn!(path = %path, timeout_ms = timeout.as_millis() as u64, "gRPC server stream timed out");
            Err(CallError::Timeout { after: timeout })
        }
    };

    ack.send(result);
}
