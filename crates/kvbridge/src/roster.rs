//! # Peer Roster
//!
//! The in-memory directory of known contexts, including the distinguished
//! "current" (self) entry. The roster is owned by one bridge and reconciled
//! through announce/update/retract broadcasts; it is eventually consistent,
//! never authoritative.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// One known context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Peer {
    /// Generated once per context; treated as globally unique for the
    /// context's lifetime. Collisions are not detected.
    pub id: String,
    pub name: String,
    /// Opaque application payload attached to the peer record.
    #[serde(default)]
    pub data: Value,
}

/// Flexible peer targeting: by id-or-name, or by arbitrary predicate.
///
/// Passing `None` where a selector is expected means "self" when selecting
/// one peer and "everyone known" when selecting many.
pub enum Selector {
    /// Matches a peer whose id or name equals the string.
    IdOrName(String),
    /// Matches every peer the predicate accepts.
    Predicate(Box<dyn Fn(&Peer) -> bool + Send + Sync>),
}

impl Selector {
    fn matches(&self, peer: &Peer) -> bool {
        match self {
            Self::IdOrName(key) => peer.id == *key || peer.name == *key,
            Self::Predicate(predicate) => predicate(peer),
        }
    }
}

impl From<&str> for Selector {
    fn from(key: &str) -> Self {
        Self::IdOrName(key.to_string())
    }
}

impl From<String> for Selector {
    fn from(key: String) -> Self {
        Self::IdOrName(key)
    }
}

/// The directory of peers for one bridge.
///
/// Invariant: `current` mirrors the directory entry with the same id. After
/// a self-removal (normal only at shutdown, when the retract broadcast loops
/// back locally) `current` degrades to a placeholder with an empty id but
/// keeps its name and data.
pub struct Roster {
    peers: Vec<Peer>,
    current: Peer,
}

impl Roster {
    pub fn new(current: Peer) -> Self {
        Self { peers: vec![current.clone()], current }
    }

    pub fn current(&self) -> &Peer {
        &self.current
    }

    /// Renames self, keeping the directory entry in sync.
    pub fn set_name(&mut self, name: &str) {
        self.current.name = name.to_string();
        self.sync_current_entry();
    }

    /// Replaces self's payload, keeping the directory entry in sync.
    pub fn set_data(&mut self, data: Value) {
        self.current.data = data;
        self.sync_current_entry();
    }

    fn sync_current_entry(&mut self) {
        let id = self.current.id.clone();
        if let Some(entry) = self.peers.iter_mut().find(|peer| peer.id == id) {
            *entry = self.current.clone();
        }
    }

    /// Inserts or replaces a peer record by id.
    ///
    /// An upsert matching the current id also refreshes `current`, which is
    /// how a self rename round-trips through the broadcast channel.
    pub fn upsert(&mut self, peer: Peer) {
        if peer.id == self.current.id {
            self.current = peer.clone();
        }
        match self.peers.iter_mut().find(|entry| entry.id == peer.id) {
            Some(entry) => *entry = peer,
            None => self.peers.push(peer),
        }
    }

    /// Drops the peer with the given id, if present.
    ///
    /// Removing the current id degrades `current` to the empty-id
    /// placeholder while retaining its name and data.
    pub fn remove(&mut self, id: &str) {
        self.peers.retain(|peer| peer.id != id);
        if self.current.id == id {
            self.current.id = String::new();
        }
    }

    /// Finds one peer. `None` selects self.
    pub fn find(&self, selector: Option<&Selector>) -> Option<Peer> {
        match selector {
            None => Some(self.current.clone()),
            Some(selector) => self.peers.iter().find(|peer| selector.matches(peer)).cloned(),
        }
    }

    /// Finds every matching peer. `None` selects all.
    pub fn find_all(&self, selector: Option<&Selector>) -> Vec<Peer> {
        match selector {
            None => self.peers.clone(),
            Some(selector) => {
                self.peers.iter().filter(|peer| selector.matches(peer)).cloned().collect()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
