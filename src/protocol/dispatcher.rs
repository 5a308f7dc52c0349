use crate::error::{constants, ProtocolError, Result};
use crate::protocol::message::Message;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type HandlerFn = dyn Fn(&Message) -> Result<Option<Message>> + Send + Sync + 'static;

/// Routes post-login messages to upper-layer services by opcode name
/// (`"CHANNEL_SEND"`, `"CHANNEL_CREATE"`, ...).
///
/// A handler may return a reply, which the session sends on its behalf.
/// Clones share the same routing table.
#[derive(Clone)]
pub struct Dispatcher {
    handlers: Arc<RwLock<HashMap<Cow<'static, str>, Box<HandlerFn>>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let routes = self.handlers.read().map(|h| h.len()).unwrap_or(0);
        f.debug_struct("Dispatcher").field("routes", &routes).finish()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn register<F>(&self, opcode: &str, handler: F) -> Result<()>
    where
        F: Fn(&Message) -> Result<Option<Message>> + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write().map_err(|_| {
            ProtocolError::Custom(constants::ERR_DISPATCHER_WRITE_LOCK.to_string())
        })?;

        handlers.insert(Cow::Owned(opcode.to_string()), Box::new(handler));
        Ok(())
    }

    /// Remove a route. Returns whether one existed.
    pub fn unregister(&self, opcode: &str) -> Result<bool> {
        let mut handlers = self.handlers.write().map_err(|_| {
            ProtocolError::Custom(constants::ERR_DISPATCHER_WRITE_LOCK.to_string())
        })?;

        Ok(handlers.remove(opcode).is_some())
    }

    pub fn dispatch(&self, msg: &Message) -> Result<Option<Message>> {
        let opcode = get_opcode(msg);

        let handlers = self.handlers.read().map_err(|_| {
            ProtocolError::Custom(constants::ERR_DISPATCHER_READ_LOCK.to_string())
        })?;

        handlers
            .get(opcode.as_ref())
            .ok_or_else(|| ProtocolError::UnhandledMessage(opcode.to_string()))
            .and_then(|handler| handler(msg))
    }
}

/// Routing key for a message. Known opcodes are static, so no allocation.
#[inline]
fn get_opcode(msg: &Message) -> Cow<'static, str> {
    Cow::Borrowed(msg.msg_type().name())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_routes_by_opcode_and_returns_reply() {
        let dispatcher = Dispatcher::new();
        dispatcher
            .register("CHANNEL_CREATE", |msg| {
                Ok(Some(Message::ChannelAccept {
                    channel: msg.channel(),
                    body: Bytes::new(),
                }))
            })
            .unwrap();

        let reply = dispatcher
            .dispatch(&Message::ChannelCreate {
                channel: 5,
                body: Bytes::from_static(b"svc"),
            })
            .unwrap();
        assert_eq!(
            reply,
            Some(Message::ChannelAccept {
                channel: 5,
                body: Bytes::new()
            })
        );
    }

    #[test]
    fn test_missing_route_is_unhandled() {
        let dispatcher = Dispatcher::new();
        let err = dispatcher
            .dispatch(&Message::ChannelSend {
                channel: 1,
                body: Bytes::new(),
            })
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnhandledMessage(ref op) if op == "CHANNEL_SEND"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_unregister() {
        let dispatcher = Dispatcher::new();
        dispatcher.register("ADMIN", |_| Ok(None)).unwrap();
        assert!(dispatcher.unregister("ADMIN").unwrap());
        assert!(!dispatcher.unregister("ADMIN").unwrap());
    }
}
