//! # Bridge
//!
//! The per-context orchestrator. Owns this context's identity, the event
//! bus, the pending-call table, and the peer roster, and decides for every
//! outbound message whether it is executed locally, delivered locally,
//! transmitted remotely, or both.
//!
//! ## Lifecycle
//!
//! `Initializing → Active → Terminated`, driven by explicit [`Bridge::start`]
//! and [`Bridge::stop`] calls from the host environment. Activation
//! announces this context to its peers and drains queued ready callbacks;
//! termination retracts the announcement and forcibly rejects every
//! outstanding call.

use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde_json::Value;

use kvrpc::CallSequence;
use kvrpc::Message;
use kvrpc::Status;
use kvrpc::codec;

use crate::bus::EventBus;
use crate::error::Error;
use crate::error::Result;
use crate::pending::PendingCalls;
use crate::roster::Peer;
use crate::roster::Roster;
use crate::roster::Selector;
use crate::store::Store;

/// Discovery broadcast: "I exist, here is my record."
pub const PEER_ANNOUNCE: &str = "peer-announce";
/// Directory broadcast: "merge this record" (also the handshake reply).
pub const PEER_UPDATE: &str = "peer-update";
/// Directory broadcast: "forget this id."
pub const PEER_RETRACT: &str = "peer-retract";

/// The default request window.
const DEFAULT_TIMEOUT_MS: i64 = 60_000;

/// Where a bridge is in its life.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// Identity generated, defaults installed, not yet announced.
    Initializing,
    /// Announced; ready callbacks have run.
    Active,
    /// Retracted; inbound change events are ignored.
    Terminated,
}

/// Construction-time configuration.
pub struct BridgeConfig {
    /// Namespace prefix for every key this bridge touches. Independent
    /// fabrics with different protocols can share one store.
    pub protocol: String,
    /// Initial display name for this context.
    pub name: String,
    /// Initial opaque payload attached to this context's peer record.
    pub data: Value,
    /// Default request window in milliseconds; zero or negative disables
    /// request timers entirely.
    pub timeout_ms: i64,
    /// Call-id source. Every bridge running in the same context must share
    /// one sequence, otherwise their call ids could collide on the store.
    pub sequence: CallSequence,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            protocol: "bridge".to_string(),
            name: String::new(),
            data: Value::Null,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            sequence: CallSequence::new(),
        }
    }
}

type ReadyCallback = Box<dyn FnOnce() + Send>;

/// One context's connection to the fabric.
pub struct Bridge {
    pub(crate) protocol: String,
    pub(crate) timeout_ms: i64,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) bus: EventBus,
    pub(crate) pending: PendingCalls,
    pub(crate) roster: Mutex<Roster>,
    pub(crate) sequence: CallSequence,
    lifecycle: Mutex<Lifecycle>,
    ready_callbacks: Mutex<Vec<ReadyCallback>>,
}

impl Bridge {
    /// Creates a bridge in the `Initializing` state.
    ///
    /// The identity is generated here; the default directory subscriptions
    /// (`peer-announce`, `peer-update`, `peer-retract`) are installed
    /// immediately so discovery works the moment the host calls
    /// [`Bridge::start`].
    pub fn new(store: Arc<dyn Store>, config: BridgeConfig) -> Arc<Self> {
        let BridgeConfig { protocol, name, data, timeout_ms, sequence } = config;
        let current = Peer { id: generate_id(), name, data };

        let bridge = Arc::new(Self {
            protocol,
            timeout_ms,
            store,
            bus: EventBus::new(),
            pending: PendingCalls::new(),
            roster: Mutex::new(Roster::new(current)),
            sequence,
            lifecycle: Mutex::new(Lifecycle::Initializing),
            ready_callbacks: Mutex::new(Vec::new()),
        });
        bridge.install_defaults();
        bridge
    }

    // ------------------------------------------------------------------
    //  Lifecycle
    // ------------------------------------------------------------------

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle_lock()
    }

    /// Activates the bridge: announces this context to every peer, then
    /// runs the queued ready callbacks in registration order.
    ///
    /// A terminated bridge cannot be restarted; `start` is then a no-op.
    pub async fn start(&self) -> Result<()> {
        if self.lifecycle() == Lifecycle::Terminated {
            return Ok(());
        }

        let record = self.self_record()?;
        self.send(PEER_ANNOUNCE, record, None).await?;

        let callbacks = {
            let mut state = self.lifecycle_lock();
            *state = Lifecycle::Active;
            std::mem::take(&mut *self.ready_lock())
        };
        tracing::debug!(id = %self.id(), "bridge active");
        for callback in callbacks {
            callback();
        }
        Ok(())
    }

    /// Terminates the bridge: retracts this context from every peer's
    /// roster and rejects every outstanding call with [`Error::Terminated`].
    pub async fn stop(&self) -> Result<()> {
        if self.lifecycle() == Lifecycle::Terminated {
            return Ok(());
        }

        let id = self.id();
        self.send(PEER_RETRACT, Value::String(id), None).await?;
        *self.lifecycle_lock() = Lifecycle::Terminated;
        self.pending.drain();
        tracing::debug!("bridge terminated");
        Ok(())
    }

    /// Runs `callback` once the bridge is active.
    ///
    /// Callbacks registered while initializing are queued and drained by
    /// [`Bridge::start`]; afterwards the callback runs immediately.
    pub fn ready(&self, callback: impl FnOnce() + Send + 'static) {
        {
            let state = self.lifecycle_lock();
            if *state == Lifecycle::Initializing {
                self.ready_lock().push(Box::new(callback));
                return;
            }
        }
        callback();
    }

    // ------------------------------------------------------------------
    //  Subscriptions
    // ------------------------------------------------------------------

    /// Subscribes a handler for a method, replacing any previous one.
    pub fn on<F, Fut>(&self, method: &str, handler: F)
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.bus.subscribe_fn(method, handler);
    }

    pub fn off(&self, method: &str) {
        self.bus.unsubscribe(method);
    }

    // ------------------------------------------------------------------
    //  Outbound
    // ------------------------------------------------------------------

    /// Fire-and-forget broadcast.
    ///
    /// With no selector the broadcast addresses everyone: it fires the
    /// local handler once *and* goes out on the global broadcast key. With
    /// a selector, each resolved peer is handled independently — self runs
    /// locally only, every other peer gets its own targeted transmit.
    pub async fn send(&self, method: &str, data: Value, selector: Option<Selector>) -> Result<()> {
        let origin = self.id();
        let targets = match &selector {
            Some(selector) => self.roster_lock().find_all(Some(selector)),
            // The wildcard everyone-marker.
            None => vec![Peer { id: String::new(), name: String::new(), data: Value::Null }],
        };

        for target in targets {
            let message = Message::broadcast(&self.protocol, &origin, &target.id, method, data.clone());
            if target.id == origin {
                self.publish_discarding(method, message).await;
            } else {
                if target.id.is_empty() {
                    self.publish_discarding(method, message.clone()).await;
                }
                self.transmit(&message).await?;
            }
        }
        Ok(())
    }

    /// Correlated request/response call. Resolves with the handler's
    /// result, or rejects with the remote failure, the timeout, or the
    /// store error that prevented transmission.
    ///
    /// `target` is a peer id, defaulting to self. A self-request runs the
    /// local handler directly — no store round trip, no pending entry, no
    /// timer. `timeout_ms` defaults to the configured window; zero or
    /// negative disables the timer, leaving the call pending until a
    /// response arrives or the bridge terminates.
    pub async fn request(
        &self,
        method: &str,
        data: Value,
        target: Option<&str>,
        timeout_ms: Option<i64>,
    ) -> Result<Value> {
        let origin = self.id();
        let target = target.map(str::to_string).unwrap_or_else(|| origin.clone());
        // The call id is consumed even on the local path, keeping ids
        // strictly increasing across every request this context makes.
        let message = Message::request(&self.protocol, &origin, &target, method, data, &self.sequence);

        if target == origin {
            return match self.bus.publish(method, message).await {
                Ok(Some(value)) => Ok(value),
                Ok(None) => Ok(Value::Null),
                Err(e) => Err(Error::Handler(format!("{e:#}"))),
            };
        }

        let timeout_ms = timeout_ms.unwrap_or(self.timeout_ms);
        let rx = self.pending.register(message.call_id, timeout_ms);
        if let Err(e) = self.transmit(&message).await {
            self.pending.discard(message.call_id);
            return Err(e);
        }
        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::ChannelClosed),
        }
    }

    // ------------------------------------------------------------------
    //  Inbound
    // ------------------------------------------------------------------

    /// Feeds one store change event into the bridge.
    ///
    /// The host calls this for every `(key, new_value)` notification it
    /// observes; `None` is a key removal. Anything malformed, foreign, or
    /// addressed elsewhere is dropped silently.
    pub async fn on_change(&self, key: &str, value: Option<&str>) {
        if self.lifecycle() == Lifecycle::Terminated {
            return;
        }
        let self_id = self.id();
        let Some(message) = codec::decode(&self_id, &self.protocol, key, value) else {
            return;
        };

        if message.is_broadcast() {
            let method = message.method.clone();
            self.publish_discarding(&method, message).await;
        } else if message.is_request() {
            let mut message = message;
            let method = message.method.clone();
            match self.bus.publish(&method, message.clone()).await {
                Ok(Some(value)) => message.data = value,
                Ok(None) => message.data = Value::Null,
                Err(e) => message.fail(format!("{e:#}")),
            }
            // The responder always replies, even to report a failure.
            message.to_response();
            if let Err(e) = self.transmit(&message).await {
                tracing::warn!(method = %method, error = %e, "failed to transmit response");
            }
        } else {
            let Message { call_id, data, status, .. } = message;
            let outcome = match status {
                Status::Failure(info) => Err(info),
                _ => Ok(data),
            };
            self.pending.settle(call_id, outcome);
        }
    }

    // ------------------------------------------------------------------
    //  Identity and roster
    // ------------------------------------------------------------------

    pub fn id(&self) -> String {
        self.roster_lock().current().id.clone()
    }

    pub fn name(&self) -> String {
        self.roster_lock().current().name.clone()
    }

    pub fn data(&self) -> Value {
        self.roster_lock().current().data.clone()
    }

    /// Finds one peer; `None` selects self.
    pub fn peer(&self, selector: Option<&Selector>) -> Option<Peer> {
        self.roster_lock().find(selector)
    }

    /// Finds matching peers; `None` selects everyone known.
    pub fn peers(&self, selector: Option<&Selector>) -> Vec<Peer> {
        self.roster_lock().find_all(selector)
    }

    /// Renames this context and broadcasts the updated record.
    pub async fn set_name(&self, name: &str) -> Result<()> {
        let record = {
            let mut roster = self.roster_lock();
            roster.set_name(name);
            serde_json::to_value(roster.current())?
        };
        self.send(PEER_UPDATE, record, None).await
    }

    /// Replaces this context's payload and broadcasts the updated record.
    pub async fn set_data(&self, data: Value) -> Result<()> {
        let record = {
            let mut roster = self.roster_lock();
            roster.set_data(data);
            serde_json::to_value(roster.current())?
        };
        self.send(PEER_UPDATE, record, None).await
    }

    // ------------------------------------------------------------------
    //  Internals
    // ------------------------------------------------------------------

    /// Installs the directory subscriptions. Handlers hold a weak
    /// reference; once the bridge is dropped they become no-ops.
    fn install_defaults(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.bus.subscribe_fn(PEER_ANNOUNCE, move |message: Message| {
            let weak = weak.clone();
            async move {
                let Some(bridge) = weak.upgrade() else {
                    return Ok(Value::Null);
                };
                let peer: Peer = serde_json::from_value(message.data)?;
                bridge.roster_lock().upsert(peer);
                // Two-way handshake: reply with our own record, addressed
                // to the announcer, so it learns this context immediately.
                let record = bridge.self_record()?;
                bridge
                    .send(PEER_UPDATE, record, Some(Selector::IdOrName(message.origin)))
                    .await?;
                Ok(Value::Null)
            }
        });

        let weak = Arc::downgrade(self);
        self.bus.subscribe_fn(PEER_UPDATE, move |message: Message| {
            let weak = weak.clone();
            async move {
                if let Some(bridge) = weak.upgrade() {
                    let peer: Peer = serde_json::from_value(message.data)?;
                    bridge.roster_lock().upsert(peer);
                }
                Ok(Value::Null)
            }
        });

        let weak = Arc::downgrade(self);
        self.bus.subscribe_fn(PEER_RETRACT, move |message: Message| {
            let weak = weak.clone();
            async move {
                if let Some(bridge) = weak.upgrade() {
                    if let Some(id) = message.data.as_str() {
                        bridge.roster_lock().remove(id);
                    }
                }
                Ok(Value::Null)
            }
        });
    }

    /// Publishes locally, discarding the handler's outcome. Broadcasts are
    /// not answerable, so a failing handler is a local defect: log it.
    async fn publish_discarding(&self, method: &str, message: Message) {
        if let Err(e) = self.bus.publish(method, message).await {
            tracing::warn!(method = %method, error = %format!("{e:#}"), "broadcast handler failed");
        }
    }

    /// Encodes and writes a message, then immediately clears its key.
    ///
    /// The store may coalesce a change notification when a key is written
    /// to the value it already holds; clearing in between guarantees every
    /// transmit produces a detectable change.
    async fn transmit(&self, message: &Message) -> Result<()> {
        let (key, value) = codec::encode(message)?;
        self.store.write(&key, &value).await?;
        self.store.clear(&key).await?;
        Ok(())
    }

    fn self_record(&self) -> Result<Value> {
        Ok(serde_json::to_value(self.roster_lock().current())?)
    }

    fn roster_lock(&self) -> MutexGuard<'_, Roster> {
        self.roster.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lifecycle_lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ready_lock(&self) -> MutexGuard<'_, Vec<ReadyCallback>> {
        self.ready_callbacks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Generates a short, human-readable context id: base36 timestamp plus a
/// base36 random component, upper-cased. Best-effort uniqueness — contexts
/// are few and short-lived, and collisions are not checked.
fn generate_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0);
    format!("{}-{}", base36(millis), base36(rand::random::<u64>())).to_uppercase()
}

fn base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = String::new();
    while value > 0 {
        out.insert(0, DIGITS[(value % 36) as usize] as char);
        value /= 36;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_uppercase_and_distinct() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
        assert!(a.contains('-'));
        assert_eq!(a, a.to_uppercase());
    }

    #[test]
    fn base36_digits() {
        assert_eq!(base36(0), "0");
        assert_eq!(base36(35), "z");
        assert_eq!(base36(36), "10");
    }
}
