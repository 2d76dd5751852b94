use std::time::Duration;

use thiserror::Error;

/// Errors delivered to the emitting party through an acknowledgment.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum CallError {
    /// The call did not complete before its deadline.
    #[error("timed out")]
    Timeout { after: Duration },

    /// The RPC backend reported an error.
    #[error("{}", .0.message())]
    Rpc(tonic::Status),

    /// The task driving the call failed before producing a result.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CallError {
    /// The gRPC status code carried by this error.
    pub fn code(&self) -> tonic::Code {
        match self {
            CallError::Timeout { .. } => tonic::Code::DeadlineExceeded,
            CallError::Rpc(status) => status.code(),
            CallError::Internal(_) => tonic::Code::Internal,
        }
    }
}

impl From<tonic::Status> for CallError {
    fn from(status: tonic::Status) -> Self {
        CallError::Rpc(status)
    }
}

/// Reasons an incoming event is rejected before any RPC is made.
///
/// The `Display` text is the message carried by the `Error` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("arguments must be an object")]
    NotAnObject,

    #[error("rpc call must register ack")]
    MissingAck,
}

/// Errors raised while reading bridge options from a configuration source.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

/// Errors seen by the consumer side of the in-process transport.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PeerError {
    /// Nothing is subscribed to the emitted event.
    #[error("no handler subscribed to '{0}'")]
    NoHandler(String),

    /// A middleware never let the connection proceed.
    #[error("connection rejected by middleware")]
    Rejected,

    /// The acknowledgment was dropped without being invoked.
    #[error("acknowledgment for '{0}' was dropped")]
    AckDropped(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = CallError::Timeout {
            after: Duration::from_millis(5000),
        };
        assert_eq!(err.to_string(), "timed out");
        assert_eq!(err.code(), tonic::Code::DeadlineExceeded);
    }

    #[test]
    fn test_rpc_error_keeps_status() {
        let err = CallError::from(tonic::Status::not_found("no such drone"));
        assert_eq!(err.to_string(), "no such drone");
        assert_eq!(err.code(), tonic::Code::NotFound);
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            ValidationError::NotAnObject.to_string(),
            "arguments must be an object"
        );
        assert_eq!(
            ValidationError::MissingAck.to_string(),
            "rpc call must register ack"
        );
    }
}
