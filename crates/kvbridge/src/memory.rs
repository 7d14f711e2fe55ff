//! # Memory Hub
//!
//! An in-process stand-in for a shared key-value store with change
//! notifications. Every bridge connected through [`MemoryHub::connect`]
//! gets its own [`Store`] handle; a write or clear through one handle is
//! delivered as a change event to every *other* connected bridge, never
//! back to the writer.
//!
//! Values are not retained: the wire protocol clears every key immediately
//! after writing it, so the hub only has to move change events around.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::Weak;

use crate::bridge::Bridge;
use crate::bridge::BridgeConfig;
use crate::store;
use crate::store::Store;

/// A fabric of in-process bridges sharing one simulated store.
pub struct MemoryHub {
    slots: Mutex<Vec<Option<Weak<Bridge>>>>,
}

impl MemoryHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { slots: Mutex::new(Vec::new()) })
    }

    /// Creates a bridge wired to this hub.
    ///
    /// The hub holds the bridge weakly; dropping every strong handle
    /// detaches the bridge from the fabric.
    pub fn connect(self: &Arc<Self>, config: BridgeConfig) -> Arc<Bridge> {
        let slot = {
            let mut slots = self.lock();
            slots.push(None);
            slots.len() - 1
        };
        let store = Arc::new(MemoryStore { hub: self.clone(), slot });
        let bridge = Bridge::new(store, config);
        self.lock()[slot] = Some(Arc::downgrade(&bridge));
        bridge
    }

    /// Delivers one change event to every connected bridge except the
    /// writer. Delivery is inline and sequential, so by the time a write
    /// returns, every recipient has fully processed it.
    async fn dispatch(&self, from: usize, key: &str, value: Option<&str>) {
        let recipients: Vec<Arc<Bridge>> = {
            let slots = self.lock();
            slots
                .iter()
                .enumerate()
                .filter(|(slot, _)| *slot != from)
                .filter_map(|(_, entry)| entry.as_ref().and_then(Weak::upgrade))
                .collect()
        };
        for bridge in recipients {
            bridge.on_change(key, value).await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Option<Weak<Bridge>>>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// One bridge's handle onto a [`MemoryHub`].
pub struct MemoryStore {
    hub: Arc<MemoryHub>,
    slot: usize,
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn write(&self, key: &str, value: &str) -> store::Result<()> {
        self.hub.dispatch(self.slot, key, Some(value)).await;
        Ok(())
    }

    async fn clear(&self, key: &str) -> store::Result<()> {
        self.hub.dispatch(self.slot, key, None).await;
        Ok(())
    }
}
