use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::CallError;

/// Name of the event used to report rejected calls back to the emitter.
pub const ERROR_EVENT: &str = "Error";

/// What an acknowledgment delivers: a payload or an error.
pub type AckResult = Result<Value, CallError>;

/// Handler subscribed to a socket event.
///
/// Receives the event's arguments and, if the emitter asked for one, its
/// acknowledgment.
pub type EventHandler = Arc<dyn Fn(Value, Option<Ack>) + Send + Sync>;

/// Continuation handed to connection middleware.
pub type Next = Box<dyn FnOnce() + Send>;

/// A connection of the realtime messaging transport.
pub trait Socket: Send + Sync {
    /// Transport-assigned connection id.
    fn id(&self) -> &str;

    /// Subscribe `handler` to `event`.
    fn on(&self, event: &str, handler: EventHandler);

    /// Send an event to the connected party.
    fn emit(&self, event: &str, payload: Vec<Value>);
}

/// Single-use acknowledgment callback supplied with an incoming event.
///
/// [`Ack::send`] consumes the value, so an acknowledgment can be delivered at
/// most once.
pub struct Ack {
    callback: Box<dyn FnOnce(AckResult) + Send>,
}

impl Ack {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(AckResult) + Send + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Deliver the result to the emitting party.
    pub fn send(self, result: AckResult) {
        (self.callback)(result)
    }
}

impl fmt::Debug for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ack").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn test_ack_delivers_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let ack = Ack::new(move |result| sink.lock().unwrap().push(result));

        ack.send(Ok(json!({ "ok": true })));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].as_ref().unwrap(), &json!({ "ok": true }));
    }
}
