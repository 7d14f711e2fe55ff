//! # Event Bus
//!
//! The local publish/subscribe dispatcher: one method name, exactly one
//! async handler. Subscribing twice to the same method silently replaces
//! the earlier handler.
//!
//! Publishing to a method nobody subscribed to is a valid, silent outcome
//! (`Ok(None)`), not an error — broadcasts routinely reach contexts that
//! do not care about them.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::Mutex;

use serde_json::Value;

use kvrpc::Message;

/// The boxed future a handler returns.
pub type HandlerFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>>;

/// A subscribed handler. Receives the full message; returns the value to
/// ship back when the message was a request.
pub type Handler = Arc<dyn Fn(Message) -> HandlerFuture + Send + Sync>;

pub struct EventBus {
    handlers: Mutex<HashMap<String, Handler>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { handlers: Mutex::new(HashMap::new()) }
    }

    /// Registers a boxed handler, replacing any previous one.
    pub fn subscribe(&self, method: &str, handler: Handler) {
        self.lock().insert(method.to_string(), handler);
    }

    /// Registers a plain async closure, replacing any previous handler.
    pub fn subscribe_fn<F, Fut>(&self, method: &str, handler: F)
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.subscribe(method, Arc::new(move |message| Box::pin(handler(message))));
    }

    pub fn unsubscribe(&self, method: &str) {
        self.lock().remove(method);
    }

    /// Dispatches a message to the handler subscribed for `method`.
    ///
    /// Returns `Ok(None)` when nobody is subscribed. The handler is cloned
    /// out of the map before awaiting, so a handler may re-enter the bus.
    pub async fn publish(&self, method: &str, message: Message) -> anyhow::Result<Option<Value>> {
        let handler = self.lock().get(method).cloned();
        match handler {
            Some(handler) => handler(message).await.map(Some),
            None => Ok(None),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Handler>> {
        // A poisoned lock only means a handler-registration panicked; the
        // map itself is still coherent.
        self.handlers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(method: &str) -> Message {
        Message::broadcast("bridge", "AAA", "", method, Value::Null)
    }

    #[tokio::test]
    async fn publish_without_subscriber_is_silent() {
        let bus = EventBus::new();
        let result = bus.publish("nobody", message("nobody")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn publish_awaits_the_handler() {
        let bus = EventBus::new();
        bus.subscribe_fn("say", |m| async move { Ok(json!(format!("hi {}", m.origin))) });

        let result = bus.publish("say", message("say")).await.unwrap();
        assert_eq!(result, Some(json!("hi AAA")));
    }

    #[tokio::test]
    async fn resubscribe_replaces_the_handler() {
        let bus = EventBus::new();
        bus.subscribe_fn("say", |_| async { Ok(json!(1)) });
        bus.subscribe_fn("say", |_| async { Ok(json!(2)) });

        let result = bus.publish("say", message("say")).await.unwrap();
        assert_eq!(result, Some(json!(2)));
    }

    #[tokio::test]
    async fn unsubscribe_silences_the_method() {
        let bus = EventBus::new();
        bus.subscribe_fn("say", |_| async { Ok(json!(1)) });
        bus.unsubscribe("say");

        let result = bus.publish("say", message("say")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn handler_errors_surface_to_the_publisher() {
        let bus = EventBus::new();
        bus.subscribe_fn("say", |_| async { anyhow::bail!("boom") });

        let err = bus.publish("say", message("say")).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
